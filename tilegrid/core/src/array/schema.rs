use tilegrid_common::array::{
    ArrayType, AttributeData, CellOrder, CellValNum, DimensionData, TileOrder,
};
use tilegrid_common::datatype::Datatype;
use tilegrid_common::dimension_constraints_go;
use tilegrid_common::filter::CompressionData;
use tilegrid_common::range::MinimumBoundingRectangle;

use crate::constants;
use crate::error::{Error, Result};

/// The closed rectangle of valid coordinates for an array.
///
/// All dimensions of a domain share one datatype.
#[derive(Clone, Debug)]
pub struct Domain {
    dimensions: Vec<DimensionData>,
}

impl Domain {
    pub fn dim_num(&self) -> usize {
        self.dimensions.len()
    }

    pub fn dimensions(&self) -> &[DimensionData] {
        &self.dimensions
    }

    pub fn dimension(&self, dim_idx: usize) -> Result<&DimensionData> {
        self.dimensions.get(dim_idx).ok_or_else(|| {
            Error::InvalidDimension(format!(
                "index {dim_idx} out of bounds for {} dimensions",
                self.dimensions.len()
            ))
        })
    }

    pub fn datatype(&self) -> Datatype {
        self.dimensions[0].datatype()
    }

    /// The domain expressed as one closed interval per dimension.
    pub fn ranges(&self) -> MinimumBoundingRectangle {
        self.dimensions.iter().map(|d| d.domain()).collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct DomainBuilder {
    dimensions: Vec<DimensionData>,
}

impl DomainBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_dimension(mut self, dimension: DimensionData) -> Result<Self> {
        if self.dimensions.iter().any(|d| d.name == dimension.name) {
            return Err(Error::InvalidArgument(format!(
                "duplicate dimension name '{}'",
                dimension.name
            )));
        }
        if let Some(first) = self.dimensions.first() {
            if first.datatype() != dimension.datatype() {
                return Err(Error::UnsupportedType(format!(
                    "dimension '{}' has type {} but the domain has type {}",
                    dimension.name,
                    dimension.datatype(),
                    first.datatype()
                )));
            }
        }

        dimension_constraints_go!(
            &dimension.constraints,
            _DT,
            [low, high],
            extent,
            {
                if low > high {
                    return Err(Error::InvalidArgument(format!(
                        "dimension '{}' domain lower bound exceeds upper bound",
                        dimension.name
                    )));
                }
                if let Some(extent) = extent {
                    if *extent <= 0 as _DT {
                        return Err(Error::InvalidArgument(format!(
                            "dimension '{}' tile extent must be positive",
                            dimension.name
                        )));
                    }
                }
            },
            {
                if low.is_nan() || high.is_nan() {
                    return Err(Error::InvalidArgument(format!(
                        "dimension '{}' domain bounds may not be NaN",
                        dimension.name
                    )));
                }
                if low > high {
                    return Err(Error::InvalidArgument(format!(
                        "dimension '{}' domain lower bound exceeds upper bound",
                        dimension.name
                    )));
                }
                if let Some(extent) = extent {
                    if extent.is_nan() || *extent <= 0 as _DT {
                        return Err(Error::InvalidArgument(format!(
                            "dimension '{}' tile extent must be positive",
                            dimension.name
                        )));
                    }
                }
            }
        );

        self.dimensions.push(dimension);
        Ok(self)
    }

    pub fn build(self) -> Result<Domain> {
        if self.dimensions.is_empty() {
            return Err(Error::InvalidArgument(
                "domain requires at least one dimension".to_owned(),
            ));
        }
        Ok(Domain {
            dimensions: self.dimensions,
        })
    }
}

/// The schema-typed description of an array: its domain, its attributes,
/// and the physical tiling and ordering parameters.
#[derive(Clone, Debug)]
pub struct Schema {
    array_type: ArrayType,
    domain: Domain,
    attributes: Vec<AttributeData>,
    cell_order: CellOrder,
    tile_order: TileOrder,
    capacity: u64,
}

impl Schema {
    pub fn array_type(&self) -> ArrayType {
        self.array_type
    }

    pub fn is_dense(&self) -> bool {
        matches!(self.array_type, ArrayType::Dense)
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn dim_num(&self) -> usize {
        self.domain.dim_num()
    }

    pub fn attributes(&self) -> &[AttributeData] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeData> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn cell_order(&self) -> CellOrder {
        self.cell_order
    }

    pub fn tile_order(&self) -> TileOrder {
        self.tile_order
    }

    /// The maximum number of cells in a sparse fragment tile.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn has_field(&self, name: &str) -> bool {
        name == constants::COORDS || self.attribute(name).is_some()
    }

    /// Returns whether cells of `name` are variable-length.
    pub fn field_is_var(&self, name: &str) -> Result<bool> {
        if name == constants::COORDS {
            return Ok(false);
        }
        self.attribute(name)
            .map(|a| a.is_var_sized())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("no such field: '{name}'"))
            })
    }

    /// Returns the size in bytes of one cell of `name`, or `None` if
    /// cells of `name` are variable-length.
    pub fn cell_size(&self, name: &str) -> Result<Option<u64>> {
        if name == constants::COORDS {
            return Ok(Some(self.coords_cell_size()));
        }
        self.attribute(name).map(|a| a.cell_size()).ok_or_else(|| {
            Error::InvalidArgument(format!("no such field: '{name}'"))
        })
    }

    pub fn coords_cell_size(&self) -> u64 {
        self.dim_num() as u64 * self.domain.datatype().size() as u64
    }

    pub fn compression(&self, name: &str) -> Option<CompressionData> {
        if name == constants::COORDS {
            return None;
        }
        self.attribute(name).and_then(|a| a.compression)
    }

    pub fn builder(array_type: ArrayType, domain: Domain) -> SchemaBuilder {
        SchemaBuilder::new(array_type, domain)
    }
}

#[derive(Debug)]
pub struct SchemaBuilder {
    array_type: ArrayType,
    domain: Domain,
    attributes: Vec<AttributeData>,
    cell_order: CellOrder,
    tile_order: TileOrder,
    capacity: u64,
}

impl SchemaBuilder {
    pub fn new(array_type: ArrayType, domain: Domain) -> Self {
        SchemaBuilder {
            array_type,
            domain,
            attributes: Vec::new(),
            cell_order: CellOrder::RowMajor,
            tile_order: TileOrder::RowMajor,
            capacity: 10000,
        }
    }

    pub fn cell_order(mut self, cell_order: CellOrder) -> Result<Self> {
        if !matches!(cell_order, CellOrder::RowMajor | CellOrder::ColumnMajor) {
            return Err(Error::InvalidArgument(format!(
                "cell order must be row-major or column-major, found {cell_order:?}"
            )));
        }
        self.cell_order = cell_order;
        Ok(self)
    }

    pub fn tile_order(mut self, tile_order: TileOrder) -> Self {
        self.tile_order = tile_order;
        self
    }

    pub fn capacity(mut self, capacity: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument(
                "tile capacity must be positive".to_owned(),
            ));
        }
        self.capacity = capacity;
        Ok(self)
    }

    pub fn add_attribute(mut self, attribute: AttributeData) -> Result<Self> {
        if attribute.name.is_empty() || attribute.name == constants::COORDS {
            return Err(Error::InvalidArgument(format!(
                "invalid attribute name: '{}'",
                attribute.name
            )));
        }
        if self.attributes.iter().any(|a| a.name == attribute.name) {
            return Err(Error::InvalidArgument(format!(
                "duplicate attribute name '{}'",
                attribute.name
            )));
        }
        if let CellValNum::Fixed(cvn) = attribute.cell_val_num {
            // keep the per-cell footprint addressable with a u32
            if cvn.get() > u32::MAX / 8 {
                return Err(Error::InvalidArgument(format!(
                    "attribute '{}' cell val num is too large",
                    attribute.name
                )));
            }
        }
        self.attributes.push(attribute);
        Ok(self)
    }

    pub fn build(self) -> Result<Schema> {
        if self.attributes.is_empty() {
            return Err(Error::InvalidArgument(
                "schema requires at least one attribute".to_owned(),
            ));
        }

        let datatype = self.domain.datatype();
        for dimension in self.domain.dimensions() {
            let allowed = match self.array_type {
                ArrayType::Dense => {
                    datatype.is_allowed_dimension_type_dense()
                }
                ArrayType::Sparse => {
                    datatype.is_allowed_dimension_type_sparse()
                }
            };
            if !allowed {
                return Err(Error::UnsupportedType(format!(
                    "datatype {datatype} is not allowed for {:?} array dimensions",
                    self.array_type
                )));
            }
            if dimension.constraints.extent_f64().is_none() {
                return Err(Error::InvalidArgument(format!(
                    "dimension '{}' requires a tile extent",
                    dimension.name
                )));
            }
        }

        Ok(Schema {
            array_type: self.array_type,
            domain: self.domain,
            attributes: self.attributes,
            cell_order: self.cell_order,
            tile_order: self.tile_order,
            capacity: self.capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use tilegrid_common::array::DimensionConstraints;

    use super::*;

    fn dim(name: &str, constraints: DimensionConstraints) -> DimensionData {
        DimensionData {
            name: name.to_owned(),
            constraints,
        }
    }

    #[test]
    fn domain_uniform_datatype() {
        let builder = DomainBuilder::new()
            .add_dimension(dim("d1", ([1u64, 4], 2u64).into()))
            .unwrap();
        let err = builder
            .add_dimension(dim("d2", ([1i32, 4], 2i32).into()))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn domain_rejects_inverted_bounds() {
        let err = DomainBuilder::new()
            .add_dimension(dim("d1", [4u64, 1].into()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn dense_requires_integral_dimensions() {
        let domain = DomainBuilder::new()
            .add_dimension(dim("d1", ([0.0f64, 100.0], 10.0f64).into()))
            .unwrap()
            .build()
            .unwrap();
        let err = Schema::builder(ArrayType::Dense, domain)
            .add_attribute(AttributeData::new("a1", Datatype::Int32))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn schema_requires_extents() {
        let domain = DomainBuilder::new()
            .add_dimension(dim("d1", [1u64, 4].into()))
            .unwrap()
            .build()
            .unwrap();
        let err = Schema::builder(ArrayType::Dense, domain)
            .add_attribute(AttributeData::new("a1", Datatype::Int32))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn reserved_attribute_name() {
        let domain = DomainBuilder::new()
            .add_dimension(dim("d1", ([1u64, 4], 2u64).into()))
            .unwrap()
            .build()
            .unwrap();
        let err = Schema::builder(ArrayType::Sparse, domain)
            .add_attribute(AttributeData::new(constants::COORDS, Datatype::Int32))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
