//! Splits an outgoing message into consecutive fragments sized by the
//! effective payload cap (spec §4.4).

use crate::frame::FrameFlags;

/// One fragment of a (possibly single-fragment) outgoing message.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub msg_id: u32,
    pub frag_idx: u16,
    pub frag_cnt: u16,
    pub flags: FrameFlags,
    pub payload: Vec<u8>,
}

/// Split `bytes` into fragments of at most `payload_max` bytes each.
///
/// Sets `ACK_REQ` on every fragment when `ack_required`, `FRAG` whenever
/// more than one fragment results, and `LAST` on the final fragment. Empty
/// input yields no fragments.
pub fn fragment(msg_id: u32, bytes: &[u8], ack_required: bool, payload_max: usize) -> Vec<Fragment> {
    if bytes.is_empty() || payload_max == 0 {
        return Vec::new();
    }
    let chunks: Vec<&[u8]> = bytes.chunks(payload_max).collect();
    let frag_cnt = chunks.len() as u16;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut flags = FrameFlags::empty();
            if ack_required {
                flags |= FrameFlags::ACK_REQ;
            }
            if frag_cnt > 1 {
                flags |= FrameFlags::FRAG;
            }
            if i as u16 == frag_cnt - 1 {
                flags |= FrameFlags::LAST;
            }
            Fragment {
                msg_id,
                frag_idx: i as u16,
                frag_cnt,
                flags,
                payload: chunk.to_vec(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_fragments() {
        assert!(fragment(1, &[], true, 10).is_empty());
    }

    #[test]
    fn single_fragment_has_no_frag_flag() {
        let frags = fragment(1, b"hello", true, 255);
        assert_eq!(frags.len(), 1);
        assert!(!frags[0].flags.contains(FrameFlags::FRAG));
        assert!(frags[0].flags.contains(FrameFlags::LAST));
        assert!(frags[0].flags.contains(FrameFlags::ACK_REQ));
    }

    #[test]
    fn multi_fragment_sets_flags_correctly() {
        let data: Vec<u8> = (0..600u32).map(|i| (i % 256) as u8).collect();
        let frags = fragment(1, &data, false, 255);
        assert_eq!(frags.len(), 3);
        for (i, f) in frags.iter().enumerate() {
            assert_eq!(f.frag_idx as usize, i);
            assert_eq!(f.frag_cnt as usize, 3);
            assert!(f.flags.contains(FrameFlags::FRAG));
            assert!(!f.flags.contains(FrameFlags::ACK_REQ));
            assert_eq!(f.flags.contains(FrameFlags::LAST), i == 2);
        }
        let reassembled: Vec<u8> = frags.iter().flat_map(|f| f.payload.clone()).collect();
        assert_eq!(reassembled, data);
    }

    use proptest::prelude::*;
    use proptest::proptest;

    proptest! {
        #[test]
        fn prop_fragments_reassemble_to_original_bytes(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            payload_max in 1usize..256,
            ack_required: bool,
        ) {
            let frags = fragment(1, &data, ack_required, payload_max);
            if data.is_empty() {
                prop_assert!(frags.is_empty());
            } else {
                let reassembled: Vec<u8> = frags.iter().flat_map(|f| f.payload.clone()).collect();
                prop_assert_eq!(reassembled, data);
                prop_assert!(frags.iter().all(|f| f.frag_cnt as usize == frags.len()));
                prop_assert!(frags.last().unwrap().flags.contains(FrameFlags::LAST));
            }
        }
    }
}
