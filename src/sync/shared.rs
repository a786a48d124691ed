//! ISR-safe engine wrapper using critical sections.

use super::primitives::CriticalSectionCell;
use crate::driver::engine::{DmaEngine, DmaInstance, LogicChannel};
use crate::driver::interrupt::{CombinedGroup, ErrorEvent};
use crate::error::Result;
use crate::register::RegisterAccess;

/// [`DmaEngine`] shared between thread mode and interrupt handlers.
///
/// All access goes through `critical_section::with()`. Notifications run
/// inside that critical section, so they must not call back into the same
/// `SharedEngine` with [`with`](Self::with); [`try_with`](Self::try_with)
/// returns `None` in that case.
///
/// # Example
///
/// ```ignore
/// static DMA: SharedEngine<Mmio> = SharedEngine::new();
///
/// DMA.with(|engine| engine.start(LogicChannel(3)))?;
/// ```
pub struct SharedEngine<R> {
    inner: CriticalSectionCell<DmaEngine<R>>,
}

impl<R> SharedEngine<R> {
    /// Create an empty shared engine (const, suitable for static initialization)
    pub const fn new() -> Self {
        Self {
            inner: CriticalSectionCell::new(DmaEngine::new()),
        }
    }

    /// Run `f` with exclusive access to the engine
    #[inline]
    pub fn with<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut DmaEngine<R>) -> T,
    {
        self.inner.with(f)
    }

    /// Run `f` with exclusive access, or return `None` if already borrowed
    #[inline]
    pub fn try_with<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut DmaEngine<R>) -> T,
    {
        self.inner.try_with(f)
    }
}

impl<R> Default for SharedEngine<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RegisterAccess + Clone> SharedEngine<R> {
    /// Combined completion interrupt handler body.
    ///
    /// Returns the serviced channel, or `None` if nothing was pending, the
    /// controller is not initialized, or the engine is mutably borrowed.
    pub fn on_combined_interrupt(
        &self,
        instance: DmaInstance,
        group: CombinedGroup,
    ) -> Option<usize> {
        self.inner
            .try_with_ref(|engine| engine.on_combined_interrupt(instance, group).ok().flatten())
            .flatten()
    }

    /// Dedicated completion interrupt handler body.
    ///
    /// Returns `Ok(false)` without acknowledging anything if the engine is
    /// mutably borrowed.
    ///
    /// # Errors
    ///
    /// Lookup errors of [`DmaEngine::on_channel_interrupt`].
    pub fn on_channel_interrupt(&self, logic: LogicChannel) -> Result<bool> {
        self.inner
            .try_with_ref(|engine| engine.on_channel_interrupt(logic))
            .unwrap_or(Ok(false))
    }

    /// Controller error interrupt handler body; `None` also when the engine
    /// is mutably borrowed
    pub fn on_error_interrupt(&self, instance: DmaInstance) -> Option<ErrorEvent> {
        self.inner
            .try_with_ref(|engine| engine.on_error_interrupt(instance).ok().flatten())
            .flatten()
    }

    /// Shared error interrupt handler body; reports nothing while the engine
    /// is mutably borrowed
    pub fn on_combined_error_interrupt(&self) -> usize {
        self.inner
            .try_with_ref(DmaEngine::on_combined_error_interrupt)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::config::{ChannelConfig, ControllerConfig, DmaConfig};
    use crate::driver::ChannelState;
    use crate::register::Endian;
    use crate::register::edma::{ES_DBE, INTL_OFFSET};
    use crate::tcd::TransferAttributes;
    use crate::testing::MockBus;

    const BASE: usize = 0x4000_8000;

    #[test]
    fn configure_then_dispatch() {
        let bus = MockBus::new();
        bus.add_edma(BASE, 16, Endian::Little);
        let controllers = [ControllerConfig::new(DmaInstance(0), BASE, 16)];
        let channels = [ChannelConfig::new(LogicChannel(1), DmaInstance(0), 1)];
        let shared = SharedEngine::new();

        shared
            .with(|engine| {
                engine.init(&bus, &DmaConfig::new(&controllers, &channels, &[], &[]))?;
                engine.configure_tcd(
                    LogicChannel(1),
                    &TransferAttributes::new(0x2000_0000, 0x2000_0100).with_interrupts(true, false),
                )?;
                engine.start(LogicChannel(1))
            })
            .unwrap();
        bus.service(BASE, 1);

        assert_eq!(
            shared.on_combined_interrupt(DmaInstance(0), CombinedGroup::Controller),
            Some(1)
        );
        assert_eq!(
            shared.with(|engine| engine.channel_state(LogicChannel(1))),
            Ok(ChannelState::Done)
        );

        bus.raise_error(BASE, 1, ES_DBE);
        assert_eq!(shared.on_combined_error_interrupt(), 1);
        assert_eq!(shared.on_error_interrupt(DmaInstance(0)), None);
    }

    #[test]
    fn uninitialized_controller_is_ignored() {
        let shared: SharedEngine<&MockBus> = SharedEngine::default();
        assert_eq!(
            shared.on_combined_interrupt(DmaInstance(0), CombinedGroup::Controller),
            None
        );
        assert!(shared.on_channel_interrupt(LogicChannel(0)).is_err());
        assert_eq!(shared.try_with(|engine| engine.locate(LogicChannel(0)).is_err()), Some(true));
    }

    #[test]
    fn handlers_inside_exclusive_access_do_nothing() {
        let bus = MockBus::new();
        bus.add_edma(BASE, 16, Endian::Little);
        let controllers = [ControllerConfig::new(DmaInstance(0), BASE, 16)];
        let channels = [ChannelConfig::new(LogicChannel(1), DmaInstance(0), 1)];
        let shared = SharedEngine::new();
        shared
            .with(|engine| engine.init(&bus, &DmaConfig::new(&controllers, &channels, &[], &[])))
            .unwrap();
        bus.poke32(BASE + INTL_OFFSET, 1 << 1);
        bus.raise_error(BASE, 1, ES_DBE);

        let nested = shared.with(|_| {
            (
                shared.on_combined_interrupt(DmaInstance(0), CombinedGroup::Controller),
                shared.on_channel_interrupt(LogicChannel(1)),
                shared.on_error_interrupt(DmaInstance(0)),
                shared.on_combined_error_interrupt(),
            )
        });
        assert_eq!(nested, (None, Ok(false), None, 0));
        assert_eq!(bus.read32(BASE + INTL_OFFSET), 1 << 1);

        assert_eq!(
            shared.on_combined_interrupt(DmaInstance(0), CombinedGroup::Controller),
            Some(1)
        );
        assert_eq!(shared.on_combined_error_interrupt(), 1);
    }
}
