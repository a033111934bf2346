//! Read-path laws: results across successive submissions concatenate
//! to the single-shot sequence, and buffer pressure yields either
//! progress or an unsplittable overflow, never silence.

mod support;

use std::sync::OnceLock;

use proptest::prelude::*;

use tilegrid_core::{
    Array, CellOrder, Context, Error, Mode, QueryBuilder, QueryFields,
    QueryStatus,
};

use support::{dense_fixture, sparse_fixture, DENSE_URI, SPARSE_URI};

fn dense_ctx() -> &'static Context {
    static CTX: OnceLock<Context> = OnceLock::new();
    CTX.get_or_init(|| dense_fixture().expect("dense fixture"))
}

fn sparse_ctx() -> &'static Context {
    static CTX: OnceLock<Context> = OnceLock::new();
    CTX.get_or_init(|| sparse_fixture().expect("sparse fixture"))
}

/// Reads `a1` over `rect`, resubmitting until completion, returning
/// the concatenated results.
fn read_a1_chunked(
    ctx: &Context,
    uri: &str,
    rect: [[u64; 2]; 2],
    layout: CellOrder,
    capacity_bytes: u64,
) -> anyhow::Result<Vec<i32>> {
    let array = Array::open(ctx, uri, Mode::Read)?;
    let mut query = QueryBuilder::read(array)
        .with_layout(layout)
        .start_subarray()
        .add_range(0, &rect[0])?
        .add_range(1, &rect[1])?
        .finish()
        .with_fields(
            QueryFields::builder().field("a1", capacity_bytes).build(),
        )
        .build()?;

    let mut out = Vec::new();
    for _ in 0..64 {
        let status = query.submit()?;
        out.extend(query.buffers().data_typed::<i32>("a1").unwrap());
        match status {
            QueryStatus::Completed => {
                query.finalize()?;
                return Ok(out);
            }
            QueryStatus::Incomplete => continue,
            other => anyhow::bail!("unexpected status {other:?}"),
        }
    }
    anyhow::bail!("read did not complete within the submission budget")
}

fn side() -> impl Strategy<Value = [u64; 2]> {
    (1u64..=4)
        .prop_flat_map(|lo| (Just(lo), lo..=4u64))
        .prop_map(|(lo, hi)| [lo, hi])
}

fn rect() -> impl Strategy<Value = [[u64; 2]; 2]> {
    (side(), side()).prop_map(|(d1, d2)| [d1, d2])
}

fn layout() -> impl Strategy<Value = CellOrder> {
    prop_oneof![
        Just(CellOrder::Global),
        Just(CellOrder::RowMajor),
        Just(CellOrder::ColumnMajor),
    ]
}

proptest! {
    /// Results across successive submissions concatenate to exactly
    /// the sequence a single unbounded submission produces.
    #[test]
    fn dense_concatenation_law(
        rect in rect(),
        layout in layout(),
        capacity_cells in 1u64..=3,
    ) {
        let ctx = dense_ctx();
        let chunked = read_a1_chunked(
            ctx, DENSE_URI, rect, layout, capacity_cells * 4,
        ).unwrap();
        let single = read_a1_chunked(
            ctx, DENSE_URI, rect, layout, 16 * 4,
        ).unwrap();
        prop_assert_eq!(chunked, single);
    }

    #[test]
    fn sparse_concatenation_law(
        rect in rect(),
        layout in layout(),
        capacity_cells in 1u64..=3,
    ) {
        let ctx = sparse_ctx();
        let chunked = read_a1_chunked(
            ctx, SPARSE_URI, rect, layout, capacity_cells * 4,
        ).unwrap();
        let single = read_a1_chunked(
            ctx, SPARSE_URI, rect, layout, 8 * 4,
        ).unwrap();
        prop_assert_eq!(chunked, single);
    }

    /// Dense reads deliver the selected rectangle's cell count no
    /// matter how the buffers are sized.
    #[test]
    fn dense_delivers_selection(
        rect in rect(),
        capacity_cells in 1u64..=3,
    ) {
        let ctx = dense_ctx();
        let results = read_a1_chunked(
            ctx, DENSE_URI, rect, CellOrder::Global, capacity_cells * 4,
        ).unwrap();
        let expected = (rect[0][1] - rect[0][0] + 1)
            * (rect[1][1] - rect[1][0] + 1);
        prop_assert_eq!(expected as usize, results.len());
    }
}

/// If the buffers accommodate every selected cell individually, the
/// read completes across submissions; if a single variable-length
/// cell exceeds the capacity in isolation, the submission fails with
/// a buffer overflow.
#[test]
fn overflow_versus_complete() -> anyhow::Result<()> {
    let ctx = dense_ctx();

    // 4 bytes of value capacity fit the largest cell ("dddd"); one
    // offset record per submission forces cell-at-a-time progress
    let array = Array::open(ctx, DENSE_URI, Mode::Read)?;
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .with_fields(QueryFields::builder().field_var("a2", 8, 4).build())
        .build()?;

    let mut delivered = Vec::new();
    let mut submissions = 0;
    loop {
        let status = query.submit()?;
        submissions += 1;
        delivered.extend_from_slice(query.buffers().bytes("a2").unwrap());
        if status == QueryStatus::Completed {
            break;
        }
        anyhow::ensure!(submissions < 64, "no completion");
    }
    assert_eq!(16, submissions);
    assert_eq!(
        b"abbcccddddeffggghhhhijjkkkllllmnnooopppp".to_vec(),
        delivered
    );
    query.finalize()?;

    // 3 bytes of value capacity cannot ever hold "dddd"
    let array = Array::open(ctx, DENSE_URI, Mode::Read)?;
    let mut query = QueryBuilder::read(array)
        .with_layout(CellOrder::Global)
        .with_fields(QueryFields::builder().field_var("a2", 8, 3).build())
        .build()?;

    let mut saw_overflow = false;
    for _ in 0..64 {
        match query.submit() {
            Ok(QueryStatus::Completed) => break,
            Ok(QueryStatus::Incomplete) => continue,
            Ok(other) => anyhow::bail!("unexpected status {other:?}"),
            Err(Error::BufferOverflow(_)) => {
                saw_overflow = true;
                break;
            }
            Err(other) => return Err(other.into()),
        }
    }
    assert!(saw_overflow);

    // growing the buffers past the stuck cell resumes the read
    query.reset_buffers(
        QueryFields::builder().field_var("a2", 8 * 16, 64).build(),
    )?;
    let mut resumed = Vec::new();
    loop {
        let status = query.submit()?;
        resumed.extend_from_slice(query.buffers().bytes("a2").unwrap());
        if status == QueryStatus::Completed {
            break;
        }
    }
    // everything from the stuck cell onward arrives after the regrow
    assert!(resumed.ends_with(b"mnnooopppp"));
    query.finalize()?;

    Ok(())
}
