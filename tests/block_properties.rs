//! Property tests for the block pipelines.

mod common;

use std::sync::Arc;

use common::{memory_io, AlwaysFail};
use proptest::{collection::vec, prelude::*};
use treeblock::{BlockConfig, CompressionKind, Error, PageImage, PageType, HEADER_SIZE};

fn unit_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(64u32), Just(512), Just(4096)]
}

fn kind_strategy() -> impl Strategy<Value = CompressionKind> {
    prop_oneof![
        Just(CompressionKind::None),
        (1i32..=9).prop_map(|level| CompressionKind::Zstd { level }),
        (0u32..=9).prop_map(|level| CompressionKind::Deflate { level }),
    ]
}

/// Payloads that range from noise to long runs, so both the compressed and
/// the fallback paths get exercised.
fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        vec(any::<u8>(), 0..6000),
        (any::<u8>(), 0usize..6000).prop_map(|(b, n)| vec![b; n]),
        vec((any::<u8>(), 1usize..64), 0..100)
            .prop_map(|runs| runs.into_iter().flat_map(|(b, n)| vec![b; n]).collect()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn write_then_read_restores_payload(
        unit in unit_strategy(),
        kind in kind_strategy(),
        payload in payload_strategy(),
    ) {
        let (io, _dev) = memory_io(
            BlockConfig::default().with_allocation_unit(unit).with_compression(kind),
        );

        let block = io.write_block(&mut io.new_image(PageType::BTreeLeaf, &payload)).unwrap();
        let uncompressed = treeblock::common::config::align_to((payload.len() + HEADER_SIZE) as u32, unit);

        prop_assert_eq!(block.size % unit, 0);
        prop_assert!(block.size <= uncompressed);

        let mut buf = PageImage::with_capacity(block.size as usize);
        io.read_block(&mut buf, block.addr, block.size).unwrap();
        prop_assert_eq!(&buf.payload()[..payload.len()], &payload[..]);
        prop_assert_eq!(buf.page_type(), PageType::BTreeLeaf);
        prop_assert_eq!(io.scratch_pool().outstanding(), 0);
    }

    #[test]
    fn single_bit_flip_is_detected(
        kind in kind_strategy(),
        payload in payload_strategy(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let (io, dev) = memory_io(
            BlockConfig::default().with_allocation_unit(64).with_compression(kind),
        );
        let block = io.write_block(&mut io.new_image(PageType::BTreeLeaf, &payload)).unwrap();

        let byte = position.index(block.size as usize);
        dev.with_bytes_mut(|bytes| bytes[byte] ^= 1 << bit);

        let mut buf = PageImage::with_capacity(block.size as usize);
        let err = io.read_block(&mut buf, block.addr, block.size).unwrap_err();
        prop_assert!(matches!(err, Error::ChecksumMismatch { .. }), "byte {} bit {}", byte, bit);
    }

    #[test]
    fn write_sequences_strictly_increase(sizes in vec(0usize..3000, 1..20)) {
        let (io, _dev) = memory_io(
            BlockConfig::default()
                .with_allocation_unit(512)
                .with_compression(CompressionKind::Zstd { level: 3 }),
        );

        let mut last = 0u64;
        for size in sizes {
            let block = io
                .write_block(&mut io.new_image(PageType::BTreeLeaf, &vec![0xAB; size]))
                .unwrap();
            prop_assert!(block.write_sequence > last);
            last = block.write_sequence;
        }
    }

    #[test]
    fn failing_compressor_never_fails_a_write(
        unit in unit_strategy(),
        payload in payload_strategy(),
    ) {
        let (io, _dev) = memory_io(BlockConfig::default().with_allocation_unit(unit));
        let io = io.with_compressor(Arc::new(AlwaysFail));

        let block = io.write_block(&mut io.new_image(PageType::Overflow, &payload)).unwrap();
        prop_assert!(!block.compressed);

        let header = io.peek_header(block.addr).unwrap();
        prop_assert_eq!(header.on_disk_size, header.in_memory_size);
        prop_assert_eq!(io.scratch_pool().outstanding(), 0);
    }
}
