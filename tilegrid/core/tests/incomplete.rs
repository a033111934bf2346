//! Cases where a read query is incomplete or overflows its buffers,
//! over the dense and sparse fixtures.

mod support;

use tilegrid_core::{
    Array, BuffersError, CellOrder, Error, Mode, QueryBuilder, QueryFields,
    QueryStatus,
};

use support::{dense_fixture, sparse_fixture, DENSE_URI, SPARSE_URI};

fn a1_fields(data: u64) -> QueryFields {
    QueryFields::builder().field("a1", data).build()
}

fn a2_fields(offsets: u64, data: u64) -> QueryFields {
    QueryFields::builder().field_var("a2", offsets, data).build()
}

#[test]
fn dense_incomplete() -> anyhow::Result<()> {
    let ctx = dense_fixture()?;
    let array = Array::open(&ctx, DENSE_URI, Mode::Read)?;

    // two ints of buffer for a four-cell selection
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .start_subarray()
        .add_range(0, &[1u64, 2])?
        .add_range(1, &[1u64, 2])?
        .finish()
        .with_fields(a1_fields(8))
        .build()?;

    assert_eq!(QueryStatus::Incomplete, query.submit()?);
    assert_eq!(Some(vec![0, 1]), query.buffers().data_typed::<i32>("a1"));
    assert_eq!(Some(8), query.buffers().data_size("a1"));

    query.finalize()?;
    Ok(())
}

#[test]
fn dense_until_complete() -> anyhow::Result<()> {
    let ctx = dense_fixture()?;
    let array = Array::open(&ctx, DENSE_URI, Mode::Read)?;

    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .start_subarray()
        .add_range(0, &[1u64, 2])?
        .add_range(1, &[1u64, 2])?
        .finish()
        .with_fields(a1_fields(8))
        .build()?;

    assert_eq!(QueryStatus::Incomplete, query.submit()?);
    assert_eq!(Some(vec![0, 1]), query.buffers().data_typed::<i32>("a1"));

    assert_eq!(QueryStatus::Completed, query.submit()?);
    assert_eq!(Some(vec![2, 3]), query.buffers().data_typed::<i32>("a1"));
    assert_eq!(Some(8), query.buffers().data_size("a1"));

    // a completed query cannot be resubmitted
    assert!(matches!(query.submit(), Err(Error::IllegalState(_))));

    query.finalize()?;
    Ok(())
}

#[test]
fn dense_unsplittable_overflow() -> anyhow::Result<()> {
    let ctx = dense_fixture()?;
    let array = Array::open(&ctx, DENSE_URI, Mode::Read)?;

    // the selected cell holds "dddd"; one byte of value capacity can
    // never receive it
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .start_subarray()
        .add_range(0, &[2u64, 2])?
        .add_range(1, &[2u64, 2])?
        .finish()
        .with_fields(a2_fields(8, 1))
        .build()?;

    assert!(matches!(query.submit(), Err(Error::BufferOverflow(_))));

    query.finalize()?;
    Ok(())
}

#[test]
fn dense_unsplittable_complete() -> anyhow::Result<()> {
    let ctx = dense_fixture()?;
    let array = Array::open(&ctx, DENSE_URI, Mode::Read)?;

    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .start_subarray()
        .add_range(0, &[1u64, 1])?
        .add_range(1, &[2u64, 2])?
        .finish()
        .with_fields(a2_fields(8, 2))
        .build()?;

    assert_eq!(QueryStatus::Completed, query.submit()?);
    assert_eq!(
        Some(&b"bb".map(|c| c as i8)[..]),
        query.buffers().data_typed::<i8>("a2").as_deref()
    );
    assert_eq!(Some(&[0u64][..]), query.buffers().offsets("a2"));

    query.finalize()?;
    Ok(())
}

#[test]
fn dense_reset_buffers() -> anyhow::Result<()> {
    let ctx = dense_fixture()?;
    let array = Array::open(&ctx, DENSE_URI, Mode::Read)?;

    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .start_subarray()
        .add_range(0, &[1u64, 2])?
        .add_range(1, &[1u64, 2])?
        .finish()
        .with_fields(a1_fields(8))
        .build()?;

    assert_eq!(QueryStatus::Incomplete, query.submit()?);
    assert_eq!(Some(vec![0, 1]), query.buffers().data_typed::<i32>("a1"));

    // shrinking below the original capacity is rejected
    assert!(matches!(
        query.reset_buffers(a1_fields(1)),
        Err(Error::Buffers(BuffersError::SizeSmaller { .. }))
    ));

    // resetting to the original capacity resumes the read
    query.reset_buffers(a1_fields(8))?;
    assert_eq!(QueryStatus::Completed, query.submit()?);
    assert_eq!(Some(vec![2, 3]), query.buffers().data_typed::<i32>("a1"));

    query.finalize()?;
    Ok(())
}

#[test]
fn dense_multi_attribute_full_scan() -> anyhow::Result<()> {
    let ctx = dense_fixture()?;
    let array = Array::open(&ctx, DENSE_URI, Mode::Read)?;

    let fields = QueryFields::builder()
        .field("a1", 16 * 4)
        .field_var("a2", 16 * 8, 64)
        .field("a3", 16 * 8)
        .build();
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .with_fields(fields)
        .build()?;

    assert_eq!(QueryStatus::Completed, query.submit()?);
    assert_eq!(
        Some((0..16).collect::<Vec<i32>>()),
        query.buffers().data_typed::<i32>("a1")
    );
    let a2 = query.buffers().data_typed::<i8>("a2").unwrap();
    assert_eq!(
        b"abbcccddddeffggghhhhijjkkkllllmnnooopppp".len(),
        a2.len()
    );
    let a3 = query.buffers().data_typed::<f32>("a3").unwrap();
    assert_eq!(32, a3.len());
    assert_eq!(0.1, a3[0]);
    assert_eq!(0.2, a3[1]);
    assert_eq!(15.0f32 + 0.2, a3[31]);

    query.finalize()?;
    Ok(())
}

#[test]
fn dense_row_major_layout() -> anyhow::Result<()> {
    let ctx = dense_fixture()?;
    let array = Array::open(&ctx, DENSE_URI, Mode::Read)?;

    // row [2, 2] across all columns crosses the tile boundary: cells
    // (2,1) (2,2) sit in tile 0, (2,3) (2,4) in tile 1
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::RowMajor)
        .start_subarray()
        .add_range(0, &[2u64, 2])?
        .add_range(1, &[1u64, 4])?
        .finish()
        .with_fields(a1_fields(16))
        .build()?;

    assert_eq!(QueryStatus::Completed, query.submit()?);
    assert_eq!(
        Some(vec![2, 3, 6, 7]),
        query.buffers().data_typed::<i32>("a1")
    );

    query.finalize()?;
    Ok(())
}

#[test]
fn sparse_incomplete_then_complete() -> anyhow::Result<()> {
    let ctx = sparse_fixture()?;
    let array = Array::open(&ctx, SPARSE_URI, Mode::Read)?;

    // one int of buffer for a two-cell selection
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .start_subarray()
        .add_range(0, &[1u64, 2])?
        .add_range(1, &[1u64, 2])?
        .finish()
        .with_fields(a1_fields(4))
        .build()?;

    assert_eq!(QueryStatus::Incomplete, query.submit()?);
    assert_eq!(Some(vec![0]), query.buffers().data_typed::<i32>("a1"));

    assert_eq!(QueryStatus::Completed, query.submit()?);
    assert_eq!(Some(vec![1]), query.buffers().data_typed::<i32>("a1"));

    query.finalize()?;
    Ok(())
}

#[test]
fn sparse_unsplittable_overflow() -> anyhow::Result<()> {
    let ctx = sparse_fixture()?;
    let array = Array::open(&ctx, SPARSE_URI, Mode::Read)?;

    // the cell at (1,2) holds "bb"
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .start_subarray()
        .add_range(0, &[1u64, 1])?
        .add_range(1, &[2u64, 2])?
        .finish()
        .with_fields(a2_fields(8, 1))
        .build()?;

    assert!(matches!(query.submit(), Err(Error::BufferOverflow(_))));

    query.finalize()?;
    Ok(())
}

#[test]
fn sparse_unsplittable_complete() -> anyhow::Result<()> {
    let ctx = sparse_fixture()?;
    let array = Array::open(&ctx, SPARSE_URI, Mode::Read)?;

    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .start_subarray()
        .add_range(0, &[1u64, 1])?
        .add_range(1, &[2u64, 2])?
        .finish()
        .with_fields(a2_fields(8, 2))
        .build()?;

    assert_eq!(QueryStatus::Completed, query.submit()?);
    assert_eq!(
        Some(&b"bb".map(|c| c as i8)[..]),
        query.buffers().data_typed::<i8>("a2").as_deref()
    );

    query.finalize()?;
    Ok(())
}

#[test]
fn sparse_coordinates_delivered() -> anyhow::Result<()> {
    use tilegrid_core::SingleValueRange;

    let ctx = sparse_fixture()?;
    let array = Array::open(&ctx, SPARSE_URI, Mode::Read)?;

    assert_eq!(
        Some(vec![
            SingleValueRange::UInt64(1, 4),
            SingleValueRange::UInt64(1, 4)
        ]),
        array.non_empty_domain()
    );

    let fields = QueryFields::builder()
        .field("a1", 8 * 4)
        .field("__coords", 8 * 16)
        .build();
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .with_fields(fields)
        .build()?;

    assert_eq!(QueryStatus::Completed, query.submit()?);
    assert_eq!(
        Some((0..8).collect::<Vec<i32>>()),
        query.buffers().data_typed::<i32>("a1")
    );
    assert_eq!(
        Some(vec![
            1u64, 1, 1, 2, 1, 4, 2, 3, 3, 1, 4, 2, 3, 3, 3, 4
        ]),
        query.buffers().data_typed::<u64>("__coords")
    );

    query.finalize()?;
    Ok(())
}

#[test]
fn sparse_row_major_differs_from_global() -> anyhow::Result<()> {
    let ctx = sparse_fixture()?;
    let array = Array::open(&ctx, SPARSE_URI, Mode::Read)?;

    // row-major across the whole domain interleaves cells of
    // different space tiles: (1,1) (1,2) (1,4) (2,3) (3,1) (3,3)
    // (3,4) (4,2)
    let mut query = QueryBuilder::read(Array::open(
        &ctx, SPARSE_URI, Mode::Read,
    )?)
    .with_layout(CellOrder::RowMajor)
    .with_fields(a1_fields(8 * 4))
    .build()?;
    assert_eq!(QueryStatus::Completed, query.submit()?);
    assert_eq!(
        Some(vec![0, 1, 2, 3, 4, 6, 7, 5]),
        query.buffers().data_typed::<i32>("a1")
    );
    query.finalize()?;

    let mut global = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .with_fields(a1_fields(8 * 4))
        .build()?;
    assert_eq!(QueryStatus::Completed, global.submit()?);
    assert_eq!(
        Some((0..8).collect::<Vec<i32>>()),
        global.buffers().data_typed::<i32>("a1")
    );
    global.finalize()?;
    Ok(())
}

#[test]
fn object_lifecycle() -> anyhow::Result<()> {
    use tilegrid_core::ObjectType;

    let ctx = dense_fixture()?;
    assert_eq!(ObjectType::Array, ctx.object_type(DENSE_URI));
    ctx.object_remove(DENSE_URI)?;
    assert_eq!(ObjectType::Invalid, ctx.object_type(DENSE_URI));
    Ok(())
}
