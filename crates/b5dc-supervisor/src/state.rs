// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Published state and change notification
//!
//! [`StatePublisher`] is the single owner of the externally visible device
//! view: one value per register in the register map, plus connectivity and
//! the build record. Every change is delivered to the observer as a
//! [`StateEvent`] carrying only the delta.

use b5dc_device::register_map::{BUILD_STATE_KEY, CONNECTION_STATE_KEY, REGISTER_MAP};
use b5dc_device::SensorValue;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Health of the link to the B5DC server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommunicationStatus {
    /// Communication not started, or stopped
    Disabled,
    NotEstablished,
    Established,
}

impl fmt::Display for CommunicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommunicationStatus::Disabled => "DISABLED",
            CommunicationStatus::NotEstablished => "NOT_ESTABLISHED",
            CommunicationStatus::Established => "ESTABLISHED",
        })
    }
}

/// Value stored under one published state key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Sensor(SensorValue),
    Connection(CommunicationStatus),
    Text(String),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Sensor(v) => write!(f, "{}", v),
            StateValue::Connection(s) => write!(f, "{}", s),
            StateValue::Text(t) => f.write_str(t),
        }
    }
}

/// State change event
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    SensorUpdated {
        register: &'static str,
        value: SensorValue,
    },
    ConnectivityChanged {
        status: CommunicationStatus,
    },
    /// JSON build record
    BuildInfoUpdated {
        record: String,
    },
}

impl StateEvent {
    /// Published state key this event changed
    pub fn key(&self) -> &'static str {
        match self {
            StateEvent::SensorUpdated { register, .. } => *register,
            StateEvent::ConnectivityChanged { .. } => CONNECTION_STATE_KEY,
            StateEvent::BuildInfoUpdated { .. } => BUILD_STATE_KEY,
        }
    }
}

/// Receiver of state change notifications
///
/// Called synchronously from whichever task performed the update, never
/// while a device or state lock is held; must not block. Events arrive in
/// the order the values were stored.
pub trait StateObserver: Send + Sync {
    fn on_state_changed(&self, event: &StateEvent);

    /// Connectivity-only hook, called after `on_state_changed`
    fn on_connectivity_changed(&self, _status: CommunicationStatus) {}
}

/// Event channel
pub type EventChannel = crossbeam::channel::Sender<StateEvent>;

impl StateObserver for EventChannel {
    fn on_state_changed(&self, event: &StateEvent) {
        // A disconnected receiver only means nobody is listening anymore
        let _ = self.try_send(event.clone());
    }
}

struct PublishedState {
    sensors: HashMap<&'static str, SensorValue>,
    connectivity: CommunicationStatus,
    build_state: String,
}

pub struct StatePublisher {
    state: RwLock<PublishedState>,
    observer: Option<Arc<dyn StateObserver>>,
    // Held from the first store of a batch until its events are delivered
    delivery: ReentrantMutex<()>,
}

impl StatePublisher {
    /// Every register starts at its default value, connectivity at
    /// `Disabled` and the build record empty.
    pub fn new(observer: Option<Arc<dyn StateObserver>>) -> Self {
        let sensors = REGISTER_MAP
            .iter()
            .map(|entry| (entry.register, entry.default_value()))
            .collect();
        Self {
            state: RwLock::new(PublishedState {
                sensors,
                connectivity: CommunicationStatus::Disabled,
                build_state: String::new(),
            }),
            observer,
            delivery: ReentrantMutex::new(()),
        }
    }

    /// Start an ordered group of updates
    ///
    /// Values are stored as the batch methods are called; the resulting
    /// events reach the observer when the batch is dropped. Batches are
    /// serialized, so observers see events in the order the values were
    /// stored. The thread holding a batch may start nested ones.
    pub fn batch(&self) -> PublishBatch<'_> {
        PublishBatch {
            publisher: self,
            _delivery: self.delivery.lock(),
            events: Vec::new(),
        }
    }

    /// Store a sensor value; returns whether it changed
    ///
    /// Registers outside the register map are ignored.
    pub fn update_sensor(&self, register: &str, value: SensorValue) -> bool {
        self.batch().sensor(register, value)
    }

    /// Store connectivity; returns whether it changed
    pub fn update_connectivity(&self, status: CommunicationStatus) -> bool {
        self.batch().connectivity(status)
    }

    /// Store the JSON build record; returns whether it changed
    pub fn update_build_state(&self, record: String) -> bool {
        self.batch().build_state(record)
    }

    fn store_sensor(&self, register: &str, value: SensorValue) -> Option<StateEvent> {
        let mut state = self.state.write();
        let (key, current) = state.sensors.get_key_value(register)?;
        if *current == value {
            return None;
        }
        let register = *key;
        state.sensors.insert(register, value);
        Some(StateEvent::SensorUpdated { register, value })
    }

    fn store_connectivity(&self, status: CommunicationStatus) -> Option<StateEvent> {
        let mut state = self.state.write();
        if state.connectivity == status {
            return None;
        }
        state.connectivity = status;
        Some(StateEvent::ConnectivityChanged { status })
    }

    fn store_build_state(&self, record: String) -> Option<StateEvent> {
        let mut state = self.state.write();
        if state.build_state == record {
            return None;
        }
        state.build_state = record.clone();
        Some(StateEvent::BuildInfoUpdated { record })
    }

    fn notify(&self, event: &StateEvent) {
        debug!(target: "b5dc-supervisor", "Updating B5dc component state with [{}]", event.key());
        if let Some(observer) = &self.observer {
            observer.on_state_changed(event);
            if let StateEvent::ConnectivityChanged { status } = event {
                observer.on_connectivity_changed(*status);
            }
        }
    }

    pub fn sensor(&self, register: &str) -> Option<SensorValue> {
        self.state.read().sensors.get(register).copied()
    }

    pub fn connectivity(&self) -> CommunicationStatus {
        self.state.read().connectivity
    }

    pub fn build_state(&self) -> String {
        self.state.read().build_state.clone()
    }

    /// Value under any published state key
    pub fn get(&self, key: &str) -> Option<StateValue> {
        let state = self.state.read();
        match key {
            CONNECTION_STATE_KEY => Some(StateValue::Connection(state.connectivity)),
            BUILD_STATE_KEY => Some(StateValue::Text(state.build_state.clone())),
            register => state.sensors.get(register).copied().map(StateValue::Sensor),
        }
    }

    /// All keys in register map order, then connectivity and build state
    pub fn snapshot(&self) -> Vec<(&'static str, StateValue)> {
        let state = self.state.read();
        let mut entries: Vec<(&'static str, StateValue)> = REGISTER_MAP
            .iter()
            .filter_map(|entry| {
                state
                    .sensors
                    .get(entry.register)
                    .map(|v| (entry.register, StateValue::Sensor(*v)))
            })
            .collect();
        entries.push((
            CONNECTION_STATE_KEY,
            StateValue::Connection(state.connectivity),
        ));
        entries.push((BUILD_STATE_KEY, StateValue::Text(state.build_state.clone())));
        entries
    }
}

/// Ordered group of published state updates, see [`StatePublisher::batch`]
pub struct PublishBatch<'a> {
    publisher: &'a StatePublisher,
    _delivery: ReentrantMutexGuard<'a, ()>,
    events: Vec<StateEvent>,
}

impl PublishBatch<'_> {
    /// Store a sensor value; returns whether it changed
    pub fn sensor(&mut self, register: &str, value: SensorValue) -> bool {
        let event = self.publisher.store_sensor(register, value);
        self.push(event)
    }

    /// Store connectivity; returns whether it changed
    pub fn connectivity(&mut self, status: CommunicationStatus) -> bool {
        let event = self.publisher.store_connectivity(status);
        self.push(event)
    }

    /// Store the JSON build record; returns whether it changed
    pub fn build_state(&mut self, record: String) -> bool {
        let event = self.publisher.store_build_state(record);
        self.push(event)
    }

    fn push(&mut self, event: Option<StateEvent>) -> bool {
        match event {
            Some(event) => {
                self.events.push(event);
                true
            }
            None => false,
        }
    }
}

impl Drop for PublishBatch<'_> {
    fn drop(&mut self) {
        for event in std::mem::take(&mut self.events) {
            self.publisher.notify(&event);
        }
    }
}
