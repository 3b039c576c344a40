use crate::common::get_current_time_or_zero;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::Rng;

const NODE_ID_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
const MAX_NODE_ID: u64 = (1 << NODE_ID_BITS) - 1;
const TIMESTAMP_SHIFT: u64 = SEQUENCE_BITS + NODE_ID_BITS;
// 2010-11-04T01:42:54.657Z
const EPOCH: u64 = 1_288_834_974_657;

struct ClockState {
    last_timestamp: u64,
    sequence: u64,
}

/// Time-ordered 64-bit id generator.
///
/// Layout, high to low: 42 bits of milliseconds since [EPOCH], 10 bits of node id,
/// 12 bits of sequence. Ids are strictly increasing for the life of the
/// generator: if the wall clock goes backwards, or the sequence is exhausted
/// within one millisecond, the logical clock is advanced instead of waiting.
pub struct SnowflakeIdGenerator {
    node_id: u64,
    state: Mutex<ClockState>,
}

impl SnowflakeIdGenerator {
    pub fn new() -> Self {
        let node_id = OsRng.gen_range(0..=MAX_NODE_ID);
        log::debug!("Id generator initialized with node id {}", node_id);
        SnowflakeIdGenerator {
            node_id,
            state: Mutex::new(ClockState {
                last_timestamp: 0,
                sequence: 0,
            }),
        }
    }

    pub fn get_id(&self) -> u64 {
        let mut state = self.state.lock();
        let now = (get_current_time_or_zero() as u64).max(EPOCH);

        if now > state.last_timestamp {
            state.last_timestamp = now;
            state.sequence = 0;
        } else if state.sequence < MAX_SEQUENCE {
            state.sequence += 1;
        } else {
            state.last_timestamp += 1;
            state.sequence = 0;
        }

        ((state.last_timestamp - EPOCH) << TIMESTAMP_SHIFT)
            | (self.node_id << SEQUENCE_BITS)
            | state.sequence
    }

    #[cfg(test)]
    pub fn node_id(&self) -> u64 {
        self.node_id
    }
}

impl Default for SnowflakeIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
