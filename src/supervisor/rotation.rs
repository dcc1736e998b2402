//! Round-robin schedule of downstream messages.
//!
//! One slot is dispatched per poll iteration. The position advances after
//! every iteration whether the send succeeded, failed, or was skipped for
//! missing data, so a stuck field never starves the others.

use std::fmt;

use crate::display::{DisplayPublisher, LinkStatus};
use crate::telemetry::TelemetrySnapshot;

/// One entry of the rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSlot {
    StateOfCharge,
    BatterySystem,
    ChargingState,
    LinkStatus,
    SourceModeStatus,
}

/// Dispatch order
pub const SLOT_TABLE: [MessageSlot; 5] = [
    MessageSlot::StateOfCharge,
    MessageSlot::BatterySystem,
    MessageSlot::ChargingState,
    MessageSlot::LinkStatus,
    MessageSlot::SourceModeStatus,
];

impl fmt::Display for MessageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageSlot::StateOfCharge => "state of charge",
            MessageSlot::BatterySystem => "battery system",
            MessageSlot::ChargingState => "charging state",
            MessageSlot::LinkStatus => "link status",
            MessageSlot::SourceModeStatus => "source mode",
        };
        f.write_str(name)
    }
}

/// Inputs a slot may draw on
#[derive(Debug, Clone, Copy)]
pub struct SlotContext<'a> {
    pub snapshot: &'a TelemetrySnapshot,
    pub link_status: LinkStatus,
    pub synthetic: bool,
}

impl MessageSlot {
    /// Send this slot's frame. Returns the publisher's result.
    pub async fn dispatch(self, publisher: &mut DisplayPublisher, ctx: &SlotContext<'_>) -> bool {
        let snapshot = ctx.snapshot;
        match self {
            MessageSlot::StateOfCharge => {
                publisher
                    .send_state_of_charge(snapshot.state_of_charge.map(i32::from))
                    .await
            }
            MessageSlot::BatterySystem => {
                publisher
                    .send_battery_system(snapshot.voltage, snapshot.current, snapshot.temperature)
                    .await
            }
            MessageSlot::ChargingState => {
                publisher.send_charging_state(snapshot.charging_state()).await
            }
            MessageSlot::LinkStatus => publisher.send_link_status(ctx.link_status).await,
            MessageSlot::SourceModeStatus => publisher.send_source_mode(ctx.synthetic).await,
        }
    }
}

/// Position in [`SLOT_TABLE`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rotation {
    position: usize,
}

impl Rotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> MessageSlot {
        SLOT_TABLE[self.position]
    }

    pub fn advance(&mut self) {
        self.position = (self.position + 1) % SLOT_TABLE.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::port_trait::mocks::MockSerialPort;

    #[test]
    fn test_rotation_wraps_after_five() {
        let mut rotation = Rotation::new();
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(rotation.current());
            rotation.advance();
        }
        assert_eq!(&seen[..5], &SLOT_TABLE);
        assert_eq!(seen[5], MessageSlot::StateOfCharge);
        assert_eq!(rotation.position(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_uses_snapshot_fields() {
        let port = MockSerialPort::new();
        let mut publisher = DisplayPublisher::new(Box::new(port.clone()), "mock");
        let snapshot = TelemetrySnapshot::new(Some(52.4), Some(3.0), Some(24.9), Some(64));
        let ctx = SlotContext {
            snapshot: &snapshot,
            link_status: LinkStatus::Connected,
            synthetic: false,
        };

        for slot in SLOT_TABLE {
            assert!(slot.dispatch(&mut publisher, &ctx).await, "{} failed", slot);
        }

        assert_eq!(
            port.get_written_lines(),
            vec![
                "BATTERY:64\n",
                "BATSYS:52.4,3.0,24.9\n",
                "CHARGING:1\n",
                "WIFI:1\n",
                "DEMO:0\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_dispatch_skips_missing_field() {
        let port = MockSerialPort::new();
        let mut publisher = DisplayPublisher::new(Box::new(port.clone()), "mock");
        let snapshot = TelemetrySnapshot::new(Some(52.4), None, Some(24.9), Some(64));
        let ctx = SlotContext {
            snapshot: &snapshot,
            link_status: LinkStatus::Skipped,
            synthetic: true,
        };

        assert!(!MessageSlot::ChargingState.dispatch(&mut publisher, &ctx).await);
        assert!(!MessageSlot::BatterySystem.dispatch(&mut publisher, &ctx).await);
        assert!(port.get_written_data().is_empty());
    }
}
