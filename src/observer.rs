use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;

/// Receives one event per upload part or poll tick
///
/// Notifications are delivered synchronously, in order, before the next
/// step of the operation starts. Returning an error aborts the operation and
/// the error is handed back to the caller unchanged.
pub trait Observer<T>: Send {
    fn notify(&mut self, event: &T) -> Result<()>;
}

impl<T, F> Observer<T> for F
where
    F: FnMut(&T) -> Result<()> + Send,
{
    fn notify(&mut self, event: &T) -> Result<()> {
        self(event)
    }
}

/// Forwards every event into an unbounded channel
///
/// If the receiver has been dropped, events are discarded and the operation
/// carries on.
#[derive(Debug, Clone)]
pub struct ChannelObserver<T> {
    tx: UnboundedSender<T>,
}

impl<T> ChannelObserver<T> {
    pub fn new(tx: UnboundedSender<T>) -> Self {
        Self { tx }
    }
}

impl<T: Clone + Send> Observer<T> for ChannelObserver<T> {
    fn notify(&mut self, event: &T) -> Result<()> {
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

pub(crate) type BoxObserver<T> = Box<dyn Observer<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::D3Error;
    use tokio::sync::mpsc;

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut observer = |n: &u32| -> Result<()> {
                seen.push(*n);
                Ok(())
            };
            Observer::<u32>::notify(&mut observer, &1).unwrap();
            Observer::<u32>::notify(&mut observer, &2).unwrap();
        }
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_closure_observer_error_propagates() {
        let mut observer = |_: &u32| -> Result<()> { Err(D3Error::validation("stop")) };
        let err = Observer::<u32>::notify(&mut observer, &1).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_channel_observer_keeps_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut observer = ChannelObserver::new(tx);
        for i in 0..3u32 {
            observer.notify(&i).unwrap();
        }
        drop(observer);

        let mut received = Vec::new();
        while let Ok(v) = rx.try_recv() {
            received.push(v);
        }
        assert_eq!(received, vec![0, 1, 2]);
    }

    #[test]
    fn test_channel_observer_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<u32>();
        drop(rx);
        let mut observer = ChannelObserver::new(tx);
        assert!(observer.notify(&7).is_ok());
    }
}
