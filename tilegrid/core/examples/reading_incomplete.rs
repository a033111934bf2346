//! Reading a sparse array with buffers too small to hold the whole
//! result, resubmitting until the query completes.

use tilegrid_core::{
    Array, ArrayType, AttributeData, CellOrder, Context, Datatype,
    DimensionData, DomainBuilder, Mode, QueryBuilder, QueryFields,
    QueryStatus, Result as TileGridResult, Schema,
};

const ARRAY_URI: &str = "reading_incomplete_array";

const INT32_ATTRIBUTE_NAME: &str = "a1";
const CHAR_ATTRIBUTE_NAME: &str = "a2";

/// Creates a sparse array at URI `ARRAY_URI`.
/// The array has two u64 dimensions ["rows", "columns"] with two
/// attributes in each cell - (a1 INT32, a2 CHAR var).
/// Both "rows" and "columns" dimensions range from 1 to 4, with tiles
/// spanning 2 elements on each dimension.
fn create_array(ctx: &Context) -> TileGridResult<()> {
    let domain = DomainBuilder::new()
        .add_dimension(DimensionData {
            name: "rows".to_owned(),
            constraints: ([1u64, 4], 2u64).into(),
        })?
        .add_dimension(DimensionData {
            name: "columns".to_owned(),
            constraints: ([1u64, 4], 2u64).into(),
        })?
        .build()?;

    let schema = Schema::builder(ArrayType::Sparse, domain)
        .capacity(2)?
        .add_attribute(AttributeData::new(
            INT32_ATTRIBUTE_NAME,
            Datatype::Int32,
        ))?
        .add_attribute(
            AttributeData::new(CHAR_ATTRIBUTE_NAME, Datatype::Char)
                .var_sized(),
        )?
        .build()?;

    Array::create(ctx, ARRAY_URI, schema)
}

/// Writes data into the array.
/// After the write, the contents of the array will be:
/// [[ (1, "a"), (2, "bb"),  _, _],
///  [ _,        (3, "ccc"), _, _],
///  [ _,        _,          _, _],
///  [ _,        _,          _, _]]
fn write_array(ctx: &Context) -> TileGridResult<()> {
    let coords: Vec<u64> = vec![1, 1, 1, 2, 2, 2];
    let a1_data: Vec<i32> = vec![1, 2, 3];
    let a2_offsets: Vec<u64> = vec![0, 1, 3];
    let a2_data: Vec<i8> =
        b"abbccc".iter().map(|c| *c as i8).collect();

    let array = Array::open(ctx, ARRAY_URI, Mode::Write)?;
    let mut query = QueryBuilder::write(array)
        .with_layout(CellOrder::Unordered)
        .coords_typed(&coords)
        .data_typed(INT32_ATTRIBUTE_NAME, &a1_data)
        .data_var_typed(CHAR_ATTRIBUTE_NAME, &a2_offsets, &a2_data)
        .build()?;
    query.submit()?;
    query.finalize()?;
    Ok(())
}

/// Reads the whole array with room for just one cell per submission.
fn read_array(ctx: &Context) -> TileGridResult<()> {
    let array = Array::open(ctx, ARRAY_URI, Mode::Read)?;

    let fields = QueryFields::builder()
        .field(INT32_ATTRIBUTE_NAME, std::mem::size_of::<i32>() as u64)
        .field_var(CHAR_ATTRIBUTE_NAME, 8, 3)
        .build();
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::RowMajor)
        .with_fields(fields)
        .build()?;

    loop {
        let status = query.submit()?;

        let a1 = query
            .buffers()
            .data_typed::<i32>(INT32_ATTRIBUTE_NAME)
            .unwrap();
        let a2 = query
            .buffers()
            .data_typed::<i8>(CHAR_ATTRIBUTE_NAME)
            .unwrap();
        let a2: String =
            a2.into_iter().map(|c| c as u8 as char).collect();
        println!("submission delivered: a1 = {a1:?}, a2 = \"{a2}\"");

        if status == QueryStatus::Completed {
            break;
        }
    }

    query.finalize()?;
    Ok(())
}

fn main() -> TileGridResult<()> {
    tracing_subscriber::fmt().init();

    let ctx = Context::new()?;
    create_array(&ctx)?;
    write_array(&ctx)?;
    read_array(&ctx)?;
    Ok(())
}
