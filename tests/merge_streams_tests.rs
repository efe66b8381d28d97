//! Tests for the stream merger.

use std::time::Duration;

use futures::StreamExt;
use nauvoo::stream::merge_streams;
use pretty_assertions::assert_eq;
use tokio_stream::wrappers::UnboundedReceiverStream;

#[tokio::test]
async fn emits_every_value_from_both_sources() {
    let (tx_a, rx_a) = tokio::sync::mpsc::unbounded_channel::<u32>();
    let (tx_b, rx_b) = tokio::sync::mpsc::unbounded_channel::<u32>();

    let merged = merge_streams(
        UnboundedReceiverStream::new(rx_a).boxed(),
        UnboundedReceiverStream::new(rx_b).boxed(),
    );

    tokio::spawn(async move {
        for i in 0..5 {
            tx_a.send(i).unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });
    tokio::spawn(async move {
        for i in 100..103 {
            tx_b.send(i).unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    });

    let values: Vec<u32> = merged.collect().await;

    assert_eq!(values.len(), 8);
    let from_a: Vec<u32> = values.iter().copied().filter(|v| *v < 100).collect();
    let from_b: Vec<u32> = values.iter().copied().filter(|v| *v >= 100).collect();
    // relative order within each source is preserved
    assert_eq!(from_a, vec![0, 1, 2, 3, 4]);
    assert_eq!(from_b, vec![100, 101, 102]);
}

#[tokio::test]
async fn primary_wins_when_both_are_ready() {
    let primary = futures::stream::iter(vec!["p1", "p2"]).boxed();
    let secondary = futures::stream::iter(vec!["s1", "s2"]).boxed();

    let values: Vec<&str> = merge_streams(primary, secondary).collect().await;

    assert_eq!(values, vec!["p1", "p2", "s1", "s2"]);
}

#[tokio::test]
async fn drains_the_remaining_source_after_one_closes() {
    let (tx_b, rx_b) = tokio::sync::mpsc::unbounded_channel::<u32>();
    let primary = futures::stream::iter(vec![1u32]).boxed();

    let merged = merge_streams(primary, UnboundedReceiverStream::new(rx_b).boxed());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        tx_b.send(2).unwrap();
        tx_b.send(3).unwrap();
    });

    let values: Vec<u32> = merged.collect().await;
    assert_eq!(values, vec![1, 2, 3]);
}

#[tokio::test]
async fn closes_only_after_both_sources_close() {
    let (tx_a, rx_a) = tokio::sync::mpsc::unbounded_channel::<u32>();
    let (tx_b, rx_b) = tokio::sync::mpsc::unbounded_channel::<u32>();

    let mut merged = merge_streams(
        UnboundedReceiverStream::new(rx_a).boxed(),
        UnboundedReceiverStream::new(rx_b).boxed(),
    );

    tx_a.send(1).unwrap();
    drop(tx_a);

    assert_eq!(merged.next().await, Some(1));

    // secondary still open: the merged stream must not be done
    let pending =
        tokio::time::timeout(Duration::from_millis(10), merged.next()).await;
    assert!(pending.is_err(), "merged stream closed while a source was open");

    tx_b.send(2).unwrap();
    drop(tx_b);
    assert_eq!(merged.next().await, Some(2));
    assert_eq!(merged.next().await, None);
}
