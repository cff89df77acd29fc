use std::sync::{
    Arc, Barrier,
    atomic::{AtomicBool, Ordering},
};

use orcsplit_testkit::{
    data_gen,
    orc_file::{OrcFileBuilder, RawStripe},
};

use super::fixture::{JsonStripeDecoder, format_file, id_name_file};
use crate::{FormatFile, ReaderOptions, ReaderState, SplitRange};

fn whole_file() -> SplitRange {
    SplitRange::new(0, u64::MAX)
}

#[test]
fn test_next_before_open_is_invalid() {
    let file = format_file(
        id_name_file(&[3], 0),
        JsonStripeDecoder::default(),
        ReaderOptions::default(),
    );
    let mut reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    assert_eq!(reader.state(), ReaderState::Unopened);
    assert!(reader.next_batch().unwrap_err().to_string().contains("before open"));
    assert!(reader.reset().is_err());

    reader.open().unwrap();
    assert!(reader.open().is_err());
    assert_eq!(reader.next_batch().unwrap().unwrap().num_rows(), 3);
}

#[test]
fn test_reset_rewinds_to_the_first_stripe() {
    let decoder = JsonStripeDecoder::default();
    let stats = decoder.stats.clone();
    let file = format_file(
        id_name_file(&[3, 4, 5], 0),
        decoder,
        ReaderOptions::default(),
    );
    let mut reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    reader.open().unwrap();

    // Rewind in the middle of the second stripe.
    reader.next_batch().unwrap().unwrap();
    let second = reader.next_batch().unwrap().unwrap();
    assert_eq!(second.stripe_index, 1);
    reader.reset().unwrap();
    assert_eq!(reader.state(), ReaderState::Ready);

    let mut offsets = Vec::new();
    while let Some(batch) = reader.next_batch().unwrap() {
        offsets.push(batch.row_offset);
    }
    assert_eq!(offsets, vec![0, 3, 7]);
    assert_eq!(reader.state(), ReaderState::Exhausted);

    // And again from the exhausted state.
    reader.reset().unwrap();
    let rows = std::iter::from_fn(|| reader.next_batch().unwrap())
        .map(|batch| batch.num_rows())
        .sum::<usize>();
    assert_eq!(rows, 12);
    assert_eq!(stats.stripe_opens(), 2 + 3 + 3);
    assert_eq!(stats.binds(), 1);
}

#[test]
fn test_cancel_during_next() {
    let started = Arc::new(Barrier::new(2));
    let cancelled = Arc::new(Barrier::new(2));
    let first_pull = Arc::new(AtomicBool::new(true));
    let hook = {
        let started = started.clone();
        let cancelled = cancelled.clone();
        Arc::new(move |_stripe: u64| {
            if first_pull.swap(false, Ordering::SeqCst) {
                started.wait();
                cancelled.wait();
            }
        })
    };
    let decoder = JsonStripeDecoder::with_pull_hook(hook);
    let stats = decoder.stats.clone();
    let file = format_file(
        id_name_file(&[5, 5, 5], 0),
        decoder,
        ReaderOptions::default(),
    );
    let mut reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    let token = reader.cancellation_token();

    let canceller = std::thread::spawn(move || {
        started.wait();
        token.cancel();
        cancelled.wait();
    });

    reader.open().unwrap();
    // The in-flight call completes with its batch.
    let batch = reader.next_batch().unwrap().unwrap();
    assert_eq!(batch.num_rows(), 5);
    canceller.join().unwrap();

    let err = reader.next_batch().unwrap_err();
    assert!(err.is_cancelled());
    assert!(reader.next_batch().unwrap().is_none());
    assert_eq!(reader.state(), ReaderState::Closed);
    assert_eq!(stats.stripe_opens(), 1);
    assert!(reader.reset().is_err());
}

#[test]
fn test_cancel_before_reading() {
    let decoder = JsonStripeDecoder::default();
    let stats = decoder.stats.clone();
    let file = format_file(id_name_file(&[5, 5], 0), decoder, ReaderOptions::default());
    let mut reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    reader.open().unwrap();
    reader.cancel();
    assert!(reader.next_batch().unwrap_err().is_cancelled());
    assert!(reader.next_batch().unwrap().is_none());
    assert_eq!(stats.stripe_opens(), 0);
}

#[test]
fn test_close_ends_the_stream() {
    let file = format_file(
        id_name_file(&[5, 5], 0),
        JsonStripeDecoder::default(),
        ReaderOptions::default(),
    );
    let mut reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    reader.open().unwrap();
    reader.next_batch().unwrap().unwrap();
    reader.close();
    assert_eq!(reader.state(), ReaderState::Closed);
    assert!(reader.next_batch().unwrap().is_none());
    // Closing wins over a later cancel.
    reader.cancel();
    assert!(reader.next_batch().unwrap().is_none());
}

#[test]
fn test_iterator_opens_on_first_poll() {
    let file = format_file(
        id_name_file(&[2, 3], 0),
        JsonStripeDecoder::default(),
        ReaderOptions::default(),
    );
    let reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    let batches = reader.collect::<orcsplit_common::Result<Vec<_>>>().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].stripe_index, 1);
}

#[test]
fn test_iterator_ends_after_a_stripe_error() {
    let mut builder = OrcFileBuilder::from_arrow_schema(&data_gen::id_name_schema()).unwrap();
    builder.add_batch(&data_gen::id_name_batch(0, 4)).unwrap();
    builder.add_raw_stripe(RawStripe::corrupt(3));
    builder.add_batch(&data_gen::id_name_batch(7, 2)).unwrap();
    let file = format_file(
        builder.finish(),
        JsonStripeDecoder::default(),
        ReaderOptions::default(),
    );
    let mut reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();

    let items = reader.by_ref().take(100).collect::<Vec<_>>();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().num_rows(), 4);
    assert!(items[1].is_err());
    assert!(reader.next().is_none());
    assert_eq!(reader.state(), ReaderState::Failed);

    let reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    assert_eq!(reader.filter_map(Result::ok).count(), 1);
}

#[test]
fn test_iterator_ends_after_a_bind_error() {
    let decoder = JsonStripeDecoder {
        fail_bind: true,
        ..Default::default()
    };
    let file = format_file(id_name_file(&[4], 0), decoder, ReaderOptions::default());
    let mut reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    assert!(reader.next().unwrap().unwrap_err().is_open_error());
    assert!(reader.next().is_none());
    assert_eq!(reader.state(), ReaderState::Failed);
}

#[test]
fn test_iterator_resumes_after_reset() {
    let file = format_file(
        id_name_file(&[2, 3], 0),
        JsonStripeDecoder::default(),
        ReaderOptions::default(),
    );
    let mut reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    assert_eq!(reader.by_ref().count(), 2);
    assert!(reader.next().is_none());
    reader.reset().unwrap();
    assert_eq!(reader.count(), 2);
}

#[test]
fn test_reader_debug_output() {
    let file = format_file(
        id_name_file(&[2, 3], 0),
        JsonStripeDecoder::default(),
        ReaderOptions::default(),
    );
    let reader = file
        .open_for_split(whole_file(), data_gen::id_name_schema())
        .unwrap();
    let text = format!("{reader:?}");
    assert!(text.starts_with("StripeStreamReader"));
    assert!(text.contains("state: Unopened"));
    assert!(text.contains("stripes: [0, 1]"));
}

#[test]
fn test_format_file_capabilities() {
    let bytes = id_name_file(&[4, 6], 0);
    let file_size = bytes.len() as u64;
    let file = format_file(bytes, JsonStripeDecoder::default(), ReaderOptions::default());
    let format: &dyn FormatFile = &file;
    assert_eq!(format.file_format(), "orc");
    assert!(format.supports_split());
    assert_eq!(format.total_rows().unwrap(), 10);

    let mut reader = format
        .create_reader(SplitRange::whole_file(file_size), data_gen::id_name_schema())
        .unwrap();
    assert_eq!(reader.output_schema(), data_gen::id_name_schema());
    reader.open().unwrap();
    let mut rows = 0;
    while let Some(batch) = reader.next_batch().unwrap() {
        rows += batch.num_rows();
    }
    assert_eq!(rows, 10);
}
