//! Push-style id generation for tree store inserts
//!
//! An id is 8 characters of millisecond time followed by 12 random
//! characters, both in an alphabet whose ASCII order matches its numeric
//! order. Ids generated by one generator sort in creation order: within the
//! same millisecond the random suffix is incremented instead of redrawn.

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;

use crate::errors::StoreResult;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const TIME_LEN: usize = 8;
const RANDOM_LEN: usize = 12;

#[derive(Debug, Default)]
struct PushState {
    last_millis: i64,
    last_random: [u8; RANDOM_LEN],
}

/// Generates unique, time-ordered keys
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<PushState>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id using the current wall clock
    pub fn next_id(&self) -> StoreResult<String> {
        self.next_id_at(Utc::now().timestamp_millis())
    }

    fn next_id_at(&self, now_millis: i64) -> StoreResult<String> {
        let mut state = self.state.lock()?;

        // A clock step backwards reuses the last timestamp to stay monotonic
        if now_millis <= state.last_millis {
            increment(&mut state.last_random);
        } else {
            state.last_millis = now_millis;
            let mut rng = rand::thread_rng();
            for digit in state.last_random.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
        }

        let mut id = String::with_capacity(TIME_LEN + RANDOM_LEN);
        let mut millis = state.last_millis;
        let mut time_chars = [0u8; TIME_LEN];
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(millis % 64) as usize];
            millis /= 64;
        }
        id.extend(time_chars.iter().map(|&c| char::from(c)));
        id.extend(
            state
                .last_random
                .iter()
                .map(|&d| char::from(PUSH_CHARS[d as usize])),
        );

        Ok(id)
    }
}

/// Base-64 increment with carry, most significant digit first
fn increment(digits: &mut [u8; RANDOM_LEN]) {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}
