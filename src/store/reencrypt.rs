//! Stream-parallel bulk encryption with ordered reassembly.
//!
//! Bulk transforms (recipient rotation, fsck repair) fan plaintexts out
//! to a fixed pool of workers and reassemble the ciphertexts in input
//! order.  Items are dispatched round-robin by sequence number: worker
//! `seq % n` handles item `seq` and each worker processes its queue in
//! order, so reading the workers' output channels round-robin yields the
//! global order deterministically.  The consumer asserts this and fails
//! with `Reordering` on any mismatch.

use std::sync::mpsc;

use crate::backend::Crypto;
use crate::ctx::Context;
use crate::errors::{Result, StoreError};

/// Number of parallel encryption workers.
const WORKERS: usize = 4;

/// One unit of work: the entry name and its serialized plaintext.
type Item = (String, Vec<u8>);

/// Output of one worker: sequence number, entry name, ciphertext.
type Sealed = (usize, String, Vec<u8>);

/// Encrypt every item for the given recipients, in parallel, returning
/// ciphertexts in input order.
///
/// Cancellation is observed at every item boundary on both the dispatch
/// and the reassembly side; partially processed batches surface
/// `Cancelled` and the caller decides what to persist.
pub fn encrypt_parallel(
    ctx: &Context,
    crypto: &dyn Crypto,
    recipients: &[String],
    items: Vec<Item>,
) -> Result<Vec<Item>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let total = items.len();
    let workers = WORKERS.min(total);

    std::thread::scope(|scope| {
        let mut senders = Vec::with_capacity(workers);
        let mut receivers = Vec::with_capacity(workers);

        for _ in 0..workers {
            let (in_tx, in_rx) = mpsc::channel::<(usize, Item)>();
            let (out_tx, out_rx) = mpsc::channel::<Result<Sealed>>();
            senders.push(in_tx);
            receivers.push(out_rx);

            let worker_ctx = ctx.clone();
            scope.spawn(move || {
                for (seq, (name, plaintext)) in in_rx {
                    if worker_ctx.is_cancelled() {
                        let _ = out_tx.send(Err(StoreError::Cancelled));
                        return;
                    }
                    let sealed = crypto
                        .encrypt(&plaintext, recipients)
                        .map(|ct| (seq, name, ct));
                    if out_tx.send(sealed).is_err() {
                        return;
                    }
                }
            });
        }

        // Round-robin dispatch by sequence number.
        for (seq, item) in items.into_iter().enumerate() {
            ctx.check()?;
            senders[seq % workers]
                .send((seq, item))
                .map_err(|_| StoreError::Cancelled)?;
        }
        // Close the input channels so the workers drain and exit.
        drop(senders);

        // Ordered reassembly: item `seq` arrives on channel `seq % n`.
        let mut out = Vec::with_capacity(total);
        for expected in 0..total {
            ctx.check()?;
            let (seq, name, ciphertext) = receivers[expected % workers]
                .recv()
                .map_err(|_| StoreError::Cancelled)??;
            if seq != expected {
                return Err(StoreError::Reordering { expected, got: seq });
            }
            out.push((name, ciphertext));
        }
        Ok(out)
    })
}
