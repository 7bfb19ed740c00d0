use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{trace, warn};

use super::state::AppState;
use super::tiles::TileRole;

/// Upper bound on follow-up notifications raised while delivering one publish.
pub const MAX_FOLLOW_UPS_PER_PUBLISH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    TileChange(TileRole),
    ScoreChange(i64),
    StateChange(AppState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    TileChange,
    ScoreChange,
    StateChange,
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::TileChange(_) => NotificationKind::TileChange,
            Notification::ScoreChange(_) => NotificationKind::ScoreChange,
            Notification::StateChange(_) => NotificationKind::StateChange,
        }
    }
}

/// Good/bad verdict derived from app-level notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapStatus {
    #[default]
    None,
    Bad,
    Good,
}

impl MapStatus {
    pub fn from_state_change(state: AppState) -> Option<Self> {
        match state {
            AppState::Dead => Some(MapStatus::Bad),
            AppState::Win => Some(MapStatus::Good),
            _ => None,
        }
    }
}

pub trait Observer {
    /// Handles one delivered notification. Anything pushed onto `follow_ups`
    /// is published to every subscriber before the outer publish returns.
    fn on_notify(&mut self, notification: &Notification, follow_ups: &mut Vec<Notification>);
}

pub type SharedObserver = Rc<RefCell<dyn Observer>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    observer: SharedObserver,
}

#[derive(Default)]
pub struct ObserverBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: SharedObserver) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.subscribers.push(Subscriber { id, observer });
        id
    }

    /// Returns false when the id was never subscribed or is already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delivers synchronously to every subscriber in subscription order.
    ///
    /// The subscriber list is borrowed immutably for the whole delivery, so
    /// handlers observe a fixed snapshot. Follow-ups are delivered breadth-first
    /// after the notification that raised them.
    ///
    /// At most `MAX_FOLLOW_UPS_PER_PUBLISH` follow-ups are delivered per call.
    /// Any raised beyond that are discarded with a warning, and their number is
    /// returned; a well-formed observer graph never reaches the cap.
    pub fn publish(&self, notification: Notification) -> usize {
        let mut pending = VecDeque::from([notification]);
        let mut follow_ups = Vec::new();
        let mut raised = 0usize;
        let mut dropped = 0usize;

        while let Some(current) = pending.pop_front() {
            trace!(kind = ?current.kind(), subscribers = self.subscribers.len(), "notification_published");
            for subscriber in &self.subscribers {
                match subscriber.observer.try_borrow_mut() {
                    Ok(mut observer) => observer.on_notify(&current, &mut follow_ups),
                    Err(_) => warn!(
                        subscription = subscriber.id.0,
                        kind = ?current.kind(),
                        "observer_busy_notification_skipped"
                    ),
                }
            }

            let budget = MAX_FOLLOW_UPS_PER_PUBLISH - raised;
            if follow_ups.len() > budget {
                let overflow = follow_ups.len() - budget;
                dropped += overflow;
                follow_ups.truncate(budget);
                warn!(
                    overflow,
                    limit = MAX_FOLLOW_UPS_PER_PUBLISH,
                    "follow_up_notifications_dropped"
                );
            }
            raised += follow_ups.len();
            pending.extend(follow_ups.drain(..));
        }
        dropped
    }
}

/// Buffers notifications until the owning component drains them during its
/// transition phase, so transitions depend only on state plus buffered events.
#[derive(Debug, Default)]
pub struct NotificationInbox {
    accepted: Vec<NotificationKind>,
    received: Vec<Notification>,
}

pub type SharedInbox = Rc<RefCell<NotificationInbox>>;

impl NotificationInbox {
    /// An empty `accepted` list accepts every kind.
    pub fn new(accepted: &[NotificationKind]) -> Self {
        Self {
            accepted: accepted.to_vec(),
            received: Vec::new(),
        }
    }

    pub fn shared(accepted: &[NotificationKind]) -> SharedInbox {
        Rc::new(RefCell::new(Self::new(accepted)))
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.received)
    }

    pub fn len(&self) -> usize {
        self.received.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.is_empty()
    }

    fn accepts(&self, kind: NotificationKind) -> bool {
        self.accepted.is_empty() || self.accepted.contains(&kind)
    }
}

impl Observer for NotificationInbox {
    fn on_notify(&mut self, notification: &Notification, _follow_ups: &mut Vec<Notification>) {
        if self.accepts(notification.kind()) {
            self.received.push(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Observer for Recorder {
        fn on_notify(&mut self, notification: &Notification, _follow_ups: &mut Vec<Notification>) {
            self.log
                .borrow_mut()
                .push(format!("{}:{:?}", self.label, notification.kind()));
        }
    }

    struct DeathRelay;

    impl Observer for DeathRelay {
        fn on_notify(&mut self, notification: &Notification, follow_ups: &mut Vec<Notification>) {
            if notification == &Notification::TileChange(TileRole::NoTile) {
                follow_ups.push(Notification::StateChange(AppState::Dead));
            }
        }
    }

    struct Echo;

    impl Observer for Echo {
        fn on_notify(&mut self, notification: &Notification, follow_ups: &mut Vec<Notification>) {
            follow_ups.push(notification.clone());
        }
    }

    fn recorder(label: &'static str, log: &Rc<RefCell<Vec<String>>>) -> SharedObserver {
        Rc::new(RefCell::new(Recorder {
            label,
            log: Rc::clone(log),
        }))
    }

    #[test]
    fn publish_delivers_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = ObserverBus::new();
        bus.subscribe(recorder("first", &log));
        bus.subscribe(recorder("second", &log));

        bus.publish(Notification::ScoreChange(5));

        assert_eq!(
            *log.borrow(),
            vec!["first:ScoreChange".to_string(), "second:ScoreChange".to_string()]
        );
    }

    #[test]
    fn unsubscribed_observer_stops_receiving() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = ObserverBus::new();
        let first = bus.subscribe(recorder("first", &log));
        bus.subscribe(recorder("second", &log));

        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));
        bus.publish(Notification::ScoreChange(1));

        assert_eq!(*log.borrow(), vec!["second:ScoreChange".to_string()]);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn follow_up_is_delivered_before_publish_returns() {
        let mut bus = ObserverBus::new();
        let inbox = NotificationInbox::shared(&[NotificationKind::StateChange]);
        bus.subscribe(Rc::new(RefCell::new(DeathRelay)));
        bus.subscribe(inbox.clone());

        bus.publish(Notification::TileChange(TileRole::NoTile));

        assert_eq!(
            inbox.borrow_mut().drain(),
            vec![Notification::StateChange(AppState::Dead)]
        );
        assert!(inbox.borrow().is_empty());
    }

    #[test]
    fn inbox_filters_by_kind() {
        let mut bus = ObserverBus::new();
        let inbox = NotificationInbox::shared(&[NotificationKind::ScoreChange]);
        bus.subscribe(inbox.clone());

        bus.publish(Notification::TileChange(TileRole::BusStop));
        bus.publish(Notification::ScoreChange(-100));

        assert_eq!(inbox.borrow().len(), 1);
        assert_eq!(
            inbox.borrow_mut().drain(),
            vec![Notification::ScoreChange(-100)]
        );
    }

    #[test]
    fn runaway_follow_ups_are_capped() {
        let mut bus = ObserverBus::new();
        let inbox = NotificationInbox::shared(&[]);
        bus.subscribe(Rc::new(RefCell::new(Echo)));
        bus.subscribe(inbox.clone());

        let dropped = bus.publish(Notification::ScoreChange(1));

        assert_eq!(dropped, 1);
        assert_eq!(inbox.borrow().len(), MAX_FOLLOW_UPS_PER_PUBLISH + 1);
    }

    #[test]
    fn follow_ups_within_the_cap_are_all_delivered() {
        let mut bus = ObserverBus::new();
        let inbox = NotificationInbox::shared(&[NotificationKind::StateChange]);
        bus.subscribe(Rc::new(RefCell::new(DeathRelay)));
        bus.subscribe(Rc::new(RefCell::new(DeathRelay)));
        bus.subscribe(inbox.clone());

        let dropped = bus.publish(Notification::TileChange(TileRole::NoTile));

        assert_eq!(dropped, 0);
        assert_eq!(inbox.borrow().len(), 2);
    }
}
