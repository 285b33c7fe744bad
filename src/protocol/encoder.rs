//! Payload encoding and checksum finalization.
//!
//! These are the only functions that mutate a session's checksum and keystream.
//! Payload words are strictly sequential: each one advances the generator, so
//! they must be encoded in image order.

use crate::core::image::ImageCursor;
use crate::core::keystream::encrypt_word;
use crate::error::Result;
use crate::protocol::exchanger::WordExchanger;
use crate::protocol::session::SessionState;
use crate::transport::Transport;
use crate::utils::clock::Clock;
use crate::utils::metrics::global_metrics;
use tracing::{debug, instrument};

/// Encode one plaintext payload word and advance the session.
///
/// Folds the word into the checksum, steps the keystream, masks the word with
/// the current byte offset, then moves the offset forward by 4.
pub fn encode_word(session: &mut SessionState, word: u32) -> u32 {
    session.checksum.fold(word);
    let key = session.keystream.advance();
    let encrypted = encrypt_word(word, session.payload_offset, key);
    session.payload_offset = session.payload_offset.wrapping_add(4);
    session.payload_words += 1;
    encrypted
}

/// Encrypt and send every payload word from the cursor's position up to
/// `transfer_size`. Returns the number of words sent.
#[instrument(skip_all, fields(start = session.payload_offset(), transfer_size = transfer_size))]
pub fn send_payload<T: Transport, C: Clock>(
    exchanger: &mut WordExchanger<T, C>,
    cursor: &mut ImageCursor<'_>,
    session: &mut SessionState,
    transfer_size: usize,
) -> Result<usize> {
    let mut sent = 0;
    while cursor.position() < transfer_size {
        debug_assert_eq!(cursor.position() as u32, session.payload_offset());
        exchanger.cancel_token().check()?;

        let word = cursor.read_word();
        let encrypted = encode_word(session, word);
        // The response during payload transfer carries nothing we use.
        exchanger.exchange(encrypted)?;

        global_metrics().payload_word();
        sent += 1;
    }
    debug!(words = sent, checksum = session.checksum(), "Payload sent");
    Ok(sent)
}

/// Fold the finalizer seed into the checksum and return the final value.
///
/// Folding happens once per session; later calls return the value unchanged.
pub fn finalize(session: &mut SessionState) -> u32 {
    if !session.finalized {
        session.checksum.fold(session.finalizer);
        session.finalized = true;
    }
    session.checksum()
}
