//! Shared 4x4 array fixtures for the read-path integration tests.
//!
//! The dense array has uint64 dimensions with 2x2 tiles and three
//! attributes: `a1: Int32` (lz4), `a2: Char` variable-length (gzip),
//! and `a3: Float32` with two values per cell (zstd). It is written
//! fully in global order with `a1` holding `0..16`. The sparse array
//! shares the schema shape and holds eight cells.

use tilegrid_core::{
    Array, ArrayType, AttributeData, CellOrder, CellValNum, CompressionData,
    CompressionType, Context, Datatype, DimensionData, DomainBuilder, Mode,
    QueryBuilder, Schema, SchemaBuilder,
};

pub const DENSE_URI: &str = "incomplete_dense";
pub const SPARSE_URI: &str = "incomplete_sparse";

fn dim(name: &str) -> DimensionData {
    DimensionData {
        name: name.to_owned(),
        constraints: ([1u64, 4], 2u64).into(),
    }
}

fn schema_builder(array_type: ArrayType) -> anyhow::Result<SchemaBuilder> {
    let domain = DomainBuilder::new()
        .add_dimension(dim("d1"))?
        .add_dimension(dim("d2"))?
        .build()?;
    Ok(Schema::builder(array_type, domain)
        .add_attribute(
            AttributeData::new("a1", Datatype::Int32).with_compression(
                CompressionData::new(CompressionType::Lz4),
            ),
        )?
        .add_attribute(
            AttributeData::new("a2", Datatype::Char)
                .var_sized()
                .with_compression(CompressionData::new(
                    CompressionType::Gzip,
                )),
        )?
        .add_attribute(
            AttributeData::new("a3", Datatype::Float32)
                .with_cell_val_num(CellValNum::try_from(2).unwrap())
                .with_compression(CompressionData::new(
                    CompressionType::Zstd,
                )),
        )?)
}

pub fn create_dense_array(ctx: &Context) -> anyhow::Result<()> {
    let schema = schema_builder(ArrayType::Dense)?.build()?;
    Array::create(ctx, DENSE_URI, schema)?;
    Ok(())
}

pub fn create_sparse_array(ctx: &Context) -> anyhow::Result<()> {
    let schema = schema_builder(ArrayType::Sparse)?.capacity(2)?.build()?;
    Array::create(ctx, SPARSE_URI, schema)?;
    Ok(())
}

fn char_values(text: &[u8]) -> Vec<i8> {
    text.iter().map(|c| *c as i8).collect()
}

pub fn write_dense_full(ctx: &Context) -> anyhow::Result<()> {
    let a1: Vec<i32> = (0..16).collect();
    let a2_off: Vec<u64> =
        vec![0, 1, 3, 6, 10, 11, 13, 16, 20, 21, 23, 26, 30, 31, 33, 36];
    let a2_val =
        char_values(b"abbcccddddeffggghhhhijjkkkllllmnnooopppp");
    let a3: Vec<f32> = (0..16)
        .flat_map(|i| [i as f32 + 0.1, i as f32 + 0.2])
        .collect();

    let array = Array::open(ctx, DENSE_URI, Mode::Write)?;
    let mut query = QueryBuilder::write(array)
        .with_layout(CellOrder::Global)
        .data_typed("a1", &a1)
        .data_var_typed("a2", &a2_off, &a2_val)
        .data_typed("a3", &a3)
        .build()?;
    assert!(query.submit()?.is_complete());
    query.finalize()?;
    Ok(())
}

pub fn write_sparse_full(ctx: &Context) -> anyhow::Result<()> {
    let coords: Vec<u64> =
        vec![1, 1, 1, 2, 1, 4, 2, 3, 3, 1, 4, 2, 3, 3, 3, 4];
    let a1: Vec<i32> = (0..8).collect();
    let a2_off: Vec<u64> = vec![0, 1, 3, 6, 10, 11, 13, 16];
    let a2_val = char_values(b"abbcccddddeffggghhhh");
    let a3: Vec<f32> = (0..8)
        .flat_map(|i| [i as f32 + 0.1, i as f32 + 0.2])
        .collect();

    let array = Array::open(ctx, SPARSE_URI, Mode::Write)?;
    let mut query = QueryBuilder::write(array)
        .with_layout(CellOrder::Global)
        .coords_typed(&coords)
        .data_typed("a1", &a1)
        .data_var_typed("a2", &a2_off, &a2_val)
        .data_typed("a3", &a3)
        .build()?;
    assert!(query.submit()?.is_complete());
    query.finalize()?;
    Ok(())
}

pub fn dense_fixture() -> anyhow::Result<Context> {
    let ctx = Context::new()?;
    create_dense_array(&ctx)?;
    write_dense_full(&ctx)?;
    Ok(ctx)
}

pub fn sparse_fixture() -> anyhow::Result<Context> {
    let ctx = Context::new()?;
    create_sparse_array(&ctx)?;
    write_sparse_full(&ctx)?;
    Ok(ctx)
}
