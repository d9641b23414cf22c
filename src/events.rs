//! Notifications around saving exports and opening stages.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Something happened to a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// A layer was written to `url`.
    Saved { url: PathBuf },
}

/// Receives file events from the exporter.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: FileEvent);
}

/// Broadcasts file events to every live subscriber.
#[derive(Debug, Default)]
pub struct MessageBus {
    subscribers: RwLock<Vec<mpsc::Sender<FileEvent>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<FileEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.write().push(sender);
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl EventSink for MessageBus {
    fn publish(&self, event: FileEvent) {
        // Receivers that were dropped unsubscribe themselves.
        self.subscribers
            .write()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

/// Writes file events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: FileEvent) {
        match event {
            FileEvent::Saved { url } => log::info!("Saved {}", url.display()),
        }
    }
}

/// Something happened to the stage being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    Opened { root_layer_path: Option<PathBuf> },
}

pub trait StageListener: Send + Sync {
    fn on_stage_event(&self, event: &StageEvent);
}

/// Fans stage events out to registered listeners.
#[derive(Default)]
pub struct StageLifecycle {
    listeners: Vec<Arc<dyn StageListener>>,
}

impl StageLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn StageListener>) {
        self.listeners.push(listener);
    }

    pub fn notify(&self, event: &StageEvent) {
        for listener in &self.listeners {
            listener.on_stage_event(event);
        }
    }
}

/// Tracks the directory of the most recently opened stage, used as the
/// default place to save exports.
///
/// Clones share the same directory.
#[derive(Debug, Default, Clone)]
pub struct DefaultDirectoryTracker {
    directory: Arc<Mutex<Option<PathBuf>>>,
}

impl DefaultDirectoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(&self) -> Option<PathBuf> {
        self.directory.lock().clone()
    }

    pub fn set_directory(&self, directory: Option<PathBuf>) {
        *self.directory.lock() = directory;
    }
}

impl StageListener for DefaultDirectoryTracker {
    fn on_stage_event(&self, event: &StageEvent) {
        match event {
            StageEvent::Opened { root_layer_path } => {
                // Anonymous layers have no directory to default to.
                let directory = root_layer_path
                    .as_ref()
                    .and_then(|path| path.parent())
                    .map(PathBuf::from);
                log::debug!("Default export directory is now {directory:?}");
                self.set_directory(directory);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_drops_closed_subscribers() {
        let bus = MessageBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();
        drop(second);

        let event = FileEvent::Saved {
            url: PathBuf::from("/exports/chair.usda"),
        };
        bus.publish(event.clone());

        assert_eq!(first.try_recv(), Ok(event));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn tracker_follows_opened_stages() {
        let tracker = DefaultDirectoryTracker::new();
        let mut lifecycle = StageLifecycle::new();
        lifecycle.subscribe(Arc::new(tracker.clone()));

        lifecycle.notify(&StageEvent::Opened {
            root_layer_path: Some(PathBuf::from("/projects/shot/scene.usda")),
        });
        assert_eq!(tracker.directory(), Some(PathBuf::from("/projects/shot")));

        lifecycle.notify(&StageEvent::Opened { root_layer_path: None });
        assert_eq!(tracker.directory(), None);
    }
}
