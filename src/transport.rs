use log::{debug, error};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::messages::{TrackerRequest, TransportEvent};

/// One live push channel. Sends are fire-and-forget: they queue and return.
pub trait Connection {
    fn is_connected(&self) -> bool;

    /// Connected, or still trying to (re)connect. False once closed or given up.
    fn is_active(&self) -> bool;

    fn emit(&self, event: &str, payload: &TrackerRequest) -> Result<(), TransportError>;

    fn close(&self) -> Result<(), TransportError>;
}

pub trait Transport {
    type Connection: Connection;

    /// Opens a connection that reports inbound traffic on `events`.
    fn open(&self, events: mpsc::Sender<TransportEvent>) -> Self::Connection;
}

/// Owns at most one connection at a time.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    connection: Option<T::Connection>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        ConnectionManager {
            transport,
            connection: None,
        }
    }

    /// Returns `true` if a new connection was opened, `false` if the existing
    /// one was reused.
    pub fn connect(&mut self, events: mpsc::Sender<TransportEvent>) -> bool {
        if self.connection.as_ref().is_some_and(|c| c.is_active()) {
            debug!("Reusing existing connection");
            return false;
        }
        if let Some(stale) = self.connection.take() {
            if let Err(err) = stale.close() {
                debug!("Error closing stale connection: {err}");
            }
        }
        self.connection = Some(self.transport.open(events));
        true
    }

    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!("Closing connection");
            if let Err(err) = connection.close() {
                error!("Error closing connection: {err}");
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_connected())
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Sends `event` if connected. Returns whether the send was queued.
    pub fn emit(&self, event: &str, tracker_id: &str) -> bool {
        let Some(connection) = self.connection.as_ref().filter(|c| c.is_connected()) else {
            debug!("Not connected, dropping {event} for {tracker_id}");
            return false;
        };
        let payload = TrackerRequest {
            tracker_id: tracker_id.to_string(),
        };
        match connection.emit(event, &payload) {
            Ok(()) => true,
            Err(err) => {
                error!("Error sending {event} for {tracker_id}: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Default)]
    pub struct Record {
        pub opened: usize,
        pub closed: usize,
        pub sent: Vec<(String, String)>,
    }

    /// In-memory transport recording every open, send and close.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingTransport {
        pub record: Arc<Mutex<Record>>,
        /// Whether newly opened connections report themselves connected.
        pub online: Arc<AtomicBool>,
    }

    impl RecordingTransport {
        pub fn online() -> Self {
            let transport = RecordingTransport::default();
            transport.online.store(true, Ordering::SeqCst);
            transport
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.record.lock().unwrap().sent.clone()
        }

        pub fn clear_sent(&self) {
            self.record.lock().unwrap().sent.clear();
        }

        pub fn opened(&self) -> usize {
            self.record.lock().unwrap().opened
        }

        pub fn closed(&self) -> usize {
            self.record.lock().unwrap().closed
        }
    }

    #[derive(Debug)]
    pub struct RecordingConnection {
        record: Arc<Mutex<Record>>,
        online: Arc<AtomicBool>,
        closed: AtomicBool,
    }

    impl Connection for RecordingConnection {
        fn is_connected(&self) -> bool {
            !self.closed.load(Ordering::SeqCst) && self.online.load(Ordering::SeqCst)
        }

        fn is_active(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        fn emit(&self, event: &str, payload: &TrackerRequest) -> Result<(), TransportError> {
            if !self.is_connected() {
                return Err(TransportError::NotConnected);
            }
            self.record
                .lock()
                .unwrap()
                .sent
                .push((event.to_string(), payload.tracker_id.clone()));
            Ok(())
        }

        fn close(&self) -> Result<(), TransportError> {
            self.closed.store(true, Ordering::SeqCst);
            self.record.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    impl Transport for RecordingTransport {
        type Connection = RecordingConnection;

        fn open(&self, _events: mpsc::Sender<TransportEvent>) -> RecordingConnection {
            self.record.lock().unwrap().opened += 1;
            RecordingConnection {
                record: self.record.clone(),
                online: self.online.clone(),
                closed: AtomicBool::new(false),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::RecordingTransport;
    use super::*;
    use crate::messages::SUBSCRIBE;

    #[test]
    fn test_connect_twice_opens_once() {
        let transport = RecordingTransport::online();
        let mut manager = ConnectionManager::new(transport.clone());
        let (tx, _rx) = mpsc::channel(8);

        assert!(manager.connect(tx.clone()));
        assert!(!manager.connect(tx));
        assert_eq!(transport.opened(), 1);
    }

    #[test]
    fn test_connect_while_still_connecting_reuses() {
        let transport = RecordingTransport::default();
        let mut manager = ConnectionManager::new(transport.clone());
        let (tx, _rx) = mpsc::channel(8);

        manager.connect(tx.clone());
        manager.connect(tx);
        assert_eq!(transport.opened(), 1);
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_disconnect_without_connection() {
        let transport = RecordingTransport::online();
        let mut manager = ConnectionManager::new(transport.clone());

        manager.disconnect();
        manager.disconnect();
        assert!(!manager.has_connection());
        assert_eq!(transport.closed(), 0);
    }

    #[test]
    fn test_reconnect_after_disconnect() {
        let transport = RecordingTransport::online();
        let mut manager = ConnectionManager::new(transport.clone());
        let (tx, _rx) = mpsc::channel(8);

        manager.connect(tx.clone());
        manager.disconnect();
        assert!(!manager.has_connection());
        assert!(manager.connect(tx));
        assert_eq!(transport.opened(), 2);
        assert_eq!(transport.closed(), 1);
    }

    #[test]
    fn test_emit_requires_connection() {
        let transport = RecordingTransport::default();
        let mut manager = ConnectionManager::new(transport.clone());
        let (tx, _rx) = mpsc::channel(8);

        assert!(!manager.emit(SUBSCRIBE, "T1"));
        manager.connect(tx);
        assert!(!manager.emit(SUBSCRIBE, "T1"));

        transport.online.store(true, Ordering::SeqCst);
        assert!(manager.emit(SUBSCRIBE, "T1"));
        assert_eq!(
            transport.sent(),
            vec![(SUBSCRIBE.to_string(), "T1".to_string())]
        );
    }
}
