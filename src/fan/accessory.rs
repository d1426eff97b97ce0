use super::{FanError, FanUpdate, IntentState, Result, UpdateCoalescer, MAX_SPEED};
use crate::serial::{LinkManager, LinkStatus};

/// User-facing fan controls.
///
/// Every get/set fails with [`FanError::CommunicationFailure`] while the serial
/// link is down, so the caller can show the fan as unreachable.
pub struct FanAccessory {
    link: LinkManager,
    coalescer: UpdateCoalescer,
}

impl FanAccessory {
    pub fn new(link: LinkManager, coalescer: UpdateCoalescer) -> Self {
        Self { link, coalescer }
    }

    fn ensure_link(&self) -> Result<()> {
        if self.link.is_ready() {
            Ok(())
        } else {
            Err(FanError::CommunicationFailure)
        }
    }

    pub fn set_on(&self, on: bool) -> Result<()> {
        log::debug!("Set On state -> {}", on);
        self.ensure_link()?;
        self.coalescer.apply_update(FanUpdate::On(on))
    }

    pub fn on(&self) -> Result<bool> {
        let on = self.coalescer.current().on;
        log::debug!("Get On state -> {}", on);
        self.ensure_link()?;
        Ok(on)
    }

    pub fn set_speed(&self, speed: u8) -> Result<()> {
        log::debug!("Set Speed -> {}", speed);
        self.ensure_link()?;
        self.coalescer.apply_update(FanUpdate::Speed(speed.min(MAX_SPEED)))
    }

    pub fn speed(&self) -> Result<u8> {
        let speed = self.coalescer.current().speed;
        log::debug!("Get Speed -> {}", speed);
        self.ensure_link()?;
        Ok(speed)
    }

    /// Current intent, regardless of link state
    pub fn state(&self) -> IntentState {
        self.coalescer.current()
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link.status()
    }

    /// Send whatever the user asked for last, then stop
    pub async fn shutdown(self) {
        self.coalescer.shutdown().await;
    }
}
