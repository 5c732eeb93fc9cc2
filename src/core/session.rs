use crate::core::commands::Transport;
use crate::core::config::SessionConfig;
use crate::core::error::{Error, Result};
use crate::core::tag::set_buzzer;
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

/// Minimum spacing between two accepted insertions
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(3000);

/// Raw slot change reported by the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotSignal {
    Inserted { reader: String, at: Instant },
    Removed { reader: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    NoCard,
    Settling,
    Active,
}

/// What happened to one signal
#[derive(Debug)]
pub enum CycleOutcome {
    /// Inside the debounce window, dropped
    Debounced,
    /// Reader could not be opened, no callback ran
    ConnectFailed(Error),
    Completed,
    /// The consumer's read cycle failed part way
    Aborted(Error),
    Removed,
}

/// Opens and releases reader handles
pub trait CardProvider {
    type Card: Transport;

    fn connect(&self, reader: &str) -> Result<Self::Card>;

    fn release(&self, card: Self::Card);
}

/// Consumer of insertion cycles
pub trait CardHandler {
    fn on_inserted(&mut self, reader: &str, card: &dyn Transport) -> Result<()>;

    fn on_removed(&mut self, reader: &str);
}

/// Accepts an insertion only if the previous accepted one is at least
/// `window` old
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, at: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if at.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_accepted = Some(at);
        true
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

/// Dispatcher for slot signals: debounce, connect, one-time buzzer setup,
/// consumer callback, release
///
/// Signals are handled one at a time. The reader handle is lent to the
/// consumer for the duration of its callback and released before the next
/// signal is looked at.
pub struct Session<P: CardProvider> {
    provider: P,
    config: SessionConfig,
    debouncer: Debouncer,
    buzzer_configured: bool,
    slots: HashMap<String, SlotState>,
}

impl<P: CardProvider> Session<P> {
    pub fn new(provider: P, config: SessionConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            provider,
            config,
            debouncer: Debouncer::default(),
            buzzer_configured: false,
            slots: HashMap::new(),
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn buzzer_configured(&self) -> bool {
        self.buzzer_configured
    }

    pub fn slot_state(&self, reader: &str) -> SlotState {
        self.slots.get(reader).copied().unwrap_or_default()
    }

    fn set_slot(&mut self, reader: &str, state: SlotState) {
        self.slots.insert(reader.to_string(), state);
    }

    /// Process one signal to completion
    pub fn handle<H: CardHandler + ?Sized>(
        &mut self,
        signal: SlotSignal,
        handler: &mut H,
    ) -> CycleOutcome {
        match signal {
            SlotSignal::Inserted { reader, at } => self.handle_inserted(&reader, at, handler),
            SlotSignal::Removed { reader } => {
                log::info!("Card removed from {reader}");
                self.set_slot(&reader, SlotState::NoCard);
                handler.on_removed(&reader);
                CycleOutcome::Removed
            }
        }
    }

    fn handle_inserted<H: CardHandler + ?Sized>(
        &mut self,
        reader: &str,
        at: Instant,
        handler: &mut H,
    ) -> CycleOutcome {
        self.set_slot(reader, SlotState::Settling);

        if !self.debouncer.accept(at) {
            log::debug!("Insertion on {reader} inside debounce window, dropped");
            self.set_slot(reader, SlotState::NoCard);
            return CycleOutcome::Debounced;
        }

        log::info!("Card inserted on {reader}");

        let card = match self.provider.connect(reader) {
            Ok(card) => card,
            Err(e) => {
                self.set_slot(reader, SlotState::NoCard);
                return CycleOutcome::ConnectFailed(e);
            }
        };
        self.set_slot(reader, SlotState::Active);

        if !self.buzzer_configured {
            self.buzzer_configured = true;
            if let Err(e) = set_buzzer(&card, self.config.buzzer_enabled) {
                log::warn!("Failed to configure buzzer: {e}");
            }
        }

        let result = handler.on_inserted(reader, &card);
        self.provider.release(card);

        match result {
            Ok(()) => CycleOutcome::Completed,
            Err(e) => CycleOutcome::Aborted(e),
        }
    }

    /// Dispatch signals until the sending side hangs up
    pub fn run<H: CardHandler + ?Sized>(&mut self, signals: Receiver<SlotSignal>, handler: &mut H) {
        for signal in signals {
            match self.handle(signal, handler) {
                CycleOutcome::ConnectFailed(e) => log::warn!("Skipping insertion: {e}"),
                CycleOutcome::Aborted(e) => log::error!("Read cycle aborted: {e}"),
                _ => {}
            }
        }
        log::info!("Signal channel closed, dispatcher stopping");
    }
}
