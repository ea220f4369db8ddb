//! Channel partitioner
//!
//! Splits the total channel count into per-stream descriptors: contiguous,
//! non-overlapping channel ranges, each with its own multicast group and
//! port derived from the configured base address.

use std::net::Ipv4Addr;

use crate::error::ConfigError;

/// Computed parameters for one multicast stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// 0-based stream ordinal
    pub index: usize,
    /// Multicast group: base address with last octet incremented by `index`
    pub multicast_address: Ipv4Addr,
    /// UDP destination port: base port + `index`
    pub port: u16,
    /// Number of channels this stream carries
    pub channel_count: u32,
    /// 1-indexed first channel of this stream in the source channel range
    pub start_channel: u32,
}

/// Partition `channel_count` channels into streams of at most
/// `channels_per_receiver` channels each.
///
/// Pure and deterministic. The resulting descriptors cover the channel
/// range exactly, with no overlap and no gap. Address and port increments
/// are rejected (rather than wrapped) when they would overflow: a wrapped
/// last octet would silently land in a different multicast block.
pub fn partition(
    channel_count: u32,
    channels_per_receiver: u32,
    base_address: Ipv4Addr,
    base_port: u16,
) -> Result<Vec<StreamDescriptor>, ConfigError> {
    if channel_count == 0 {
        return Err(ConfigError::InvalidChannelCount);
    }
    if channels_per_receiver == 0 {
        return Err(ConfigError::InvalidChannelsPerReceiver);
    }

    let stream_count = channel_count.div_ceil(channels_per_receiver) as usize;
    let octets = base_address.octets();

    // Validate against the highest index up front so the partition either
    // fully succeeds or fails without producing a partial layout.
    let last_index = stream_count - 1;
    let highest_octet = octets[3] as u32 + last_index as u32;
    if highest_octet > 255 {
        return Err(ConfigError::AddressOverflow {
            index: last_index,
            octet: highest_octet,
        });
    }
    if base_port.checked_add(last_index as u16).is_none() || last_index > u16::MAX as usize {
        return Err(ConfigError::PortOverflow {
            index: last_index,
            base_port,
        });
    }

    let mut descriptors = Vec::with_capacity(stream_count);
    for index in 0..stream_count {
        let start = index as u32 * channels_per_receiver;
        let end = (start + channels_per_receiver).min(channel_count);

        descriptors.push(StreamDescriptor {
            index,
            multicast_address: Ipv4Addr::new(
                octets[0],
                octets[1],
                octets[2],
                octets[3] + index as u8,
            ),
            port: base_port + index as u16,
            channel_count: end - start,
            // 1-indexed, matching the source endpoint's channel numbering
            start_channel: start + 1,
        });
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base() -> Ipv4Addr {
        Ipv4Addr::new(239, 1, 1, 0)
    }

    #[test]
    fn test_two_even_streams() {
        let streams = partition(16, 8, base(), 5004).unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(
            streams[0],
            StreamDescriptor {
                index: 0,
                multicast_address: Ipv4Addr::new(239, 1, 1, 0),
                port: 5004,
                channel_count: 8,
                start_channel: 1,
            }
        );
        assert_eq!(
            streams[1],
            StreamDescriptor {
                index: 1,
                multicast_address: Ipv4Addr::new(239, 1, 1, 1),
                port: 5005,
                channel_count: 8,
                start_channel: 9,
            }
        );
    }

    #[test]
    fn test_uneven_last_stream() {
        let streams = partition(10, 4, base(), 5004).unwrap();
        let counts: Vec<u32> = streams.iter().map(|s| s.channel_count).collect();
        assert_eq!(counts, vec![4, 4, 2]);
        assert_eq!(streams[2].start_channel, 9);
    }

    #[test]
    fn test_single_stream() {
        let streams = partition(2, 8, base(), 5004).unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].channel_count, 2);
        assert_eq!(streams[0].start_channel, 1);
    }

    #[test]
    fn test_zero_channels_rejected() {
        assert!(matches!(
            partition(0, 8, base(), 5004),
            Err(ConfigError::InvalidChannelCount)
        ));
    }

    #[test]
    fn test_zero_channels_per_receiver_rejected() {
        assert!(matches!(
            partition(16, 0, base(), 5004),
            Err(ConfigError::InvalidChannelsPerReceiver)
        ));
    }

    #[test]
    fn test_address_overflow_rejected() {
        // 4 streams starting at .254 would need octet 257
        let result = partition(8, 2, Ipv4Addr::new(239, 1, 1, 254), 5004);
        assert!(matches!(
            result,
            Err(ConfigError::AddressOverflow { index: 3, octet: 257 })
        ));
    }

    #[test]
    fn test_address_at_boundary_accepted() {
        let streams = partition(4, 2, Ipv4Addr::new(239, 1, 1, 254), 5004).unwrap();
        assert_eq!(streams[1].multicast_address, Ipv4Addr::new(239, 1, 1, 255));
    }

    #[test]
    fn test_port_overflow_rejected() {
        let result = partition(8, 2, base(), u16::MAX - 1);
        assert!(matches!(result, Err(ConfigError::PortOverflow { .. })));
    }

    proptest! {
        #[test]
        fn prop_partition_covers_channel_range(
            channel_count in 1u32..=256,
            channels_per_receiver in 1u32..64,
        ) {
            let streams =
                partition(channel_count, channels_per_receiver, base(), 5004).unwrap();

            // Stream count is ceil(channel_count / channels_per_receiver)
            prop_assert_eq!(
                streams.len() as u32,
                channel_count.div_ceil(channels_per_receiver)
            );

            // Ranges are contiguous and non-overlapping, starting at channel 1
            let mut next_start = 1u32;
            for stream in &streams {
                prop_assert_eq!(stream.start_channel, next_start);
                prop_assert!(stream.channel_count >= 1);
                prop_assert!(stream.channel_count <= channels_per_receiver);
                next_start += stream.channel_count;
            }

            // The union has size exactly channel_count
            prop_assert_eq!(next_start - 1, channel_count);
        }

        #[test]
        fn prop_ports_and_addresses_increase_with_index(
            channel_count in 1u32..=256,
            channels_per_receiver in 1u32..64,
        ) {
            let streams =
                partition(channel_count, channels_per_receiver, base(), 5004).unwrap();
            for stream in &streams {
                prop_assert_eq!(stream.port, 5004 + stream.index as u16);
                prop_assert_eq!(
                    stream.multicast_address.octets()[3],
                    stream.index as u8
                );
            }
        }

        #[test]
        fn prop_partition_is_deterministic(
            channel_count in 1u32..256,
            channels_per_receiver in 1u32..32,
        ) {
            let a = partition(channel_count, channels_per_receiver, base(), 5004).unwrap();
            let b = partition(channel_count, channels_per_receiver, base(), 5004).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
