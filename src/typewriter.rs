//! Incremental reveal of a finished reply, for the "typing" effect.
//!
//! The reveal is a lazy stream of snapshots. Dropping the stream or firing
//! the token stops it; frames already handed out stay valid.

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Words,
    Chars,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevealFrame {
    pub text: String,
    pub done: bool,
}

/// Byte offsets at which each step of the reveal ends.
fn cut_points(text: &str, granularity: Granularity) -> Vec<usize> {
    match granularity {
        Granularity::Chars => text
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .collect(),
        Granularity::Words => {
            let mut cuts: Vec<usize> = text
                .match_indices(' ')
                .map(|(i, _)| i)
                .filter(|&i| i > 0)
                .collect();
            cuts.push(text.len());
            cuts.dedup();
            cuts
        }
    }
}

pub fn reveal(
    text: impl Into<String>,
    granularity: Granularity,
    interval: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = RevealFrame> {
    let text = text.into();
    let cuts = if text.is_empty() {
        vec![0]
    } else {
        cut_points(&text, granularity)
    };
    let last = cuts.len() - 1;

    let frames = stream::iter(cuts.into_iter().enumerate()).then(move |(step, cut)| {
        let frame = RevealFrame {
            text: text[..cut].to_string(),
            done: step == last,
        };
        async move {
            if step > 0 {
                tokio::time::sleep(interval).await;
            }
            frame
        }
    });

    frames.take_until(async move { cancel.cancelled().await })
}
