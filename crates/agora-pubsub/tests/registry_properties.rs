//! Property tests for the subscription registry.

use std::sync::Arc;

use agora_core::{RequestId, SessionId};
use agora_pubsub::{SessionHandle, SubscriptionRegistry, Topic};
use proptest::prelude::*;
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
enum Op {
    Subscribe { session: usize, topic: usize, rid: u64 },
    Unsubscribe { session: usize, topic: usize, rid: Option<u64> },
    UnsubscribeAll { session: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..4_usize, 0..5_usize, 0..3_u64).prop_map(|(session, topic, rid)| Op::Subscribe { session, topic, rid }),
        2 => (0..4_usize, 0..5_usize, proptest::option::of(0..3_u64))
            .prop_map(|(session, topic, rid)| Op::Unsubscribe { session, topic, rid }),
        1 => (0..4_usize).prop_map(|session| Op::UnsubscribeAll { session }),
    ]
}

fn sessions(n: usize) -> (Vec<Arc<SessionHandle>>, Vec<mpsc::Receiver<Arc<String>>>) {
    (0..n)
        .map(|i| {
            let (tx, rx) = mpsc::channel(1);
            (Arc::new(SessionHandle::new(SessionId::from(format!("s{i}").as_str()), None, tx)), rx)
        })
        .unzip()
}

fn topic(i: usize) -> Topic {
    Topic::instance("ballot", &i.to_string())
}

fn holds(reg: &SubscriptionRegistry, session: &SessionId, topic: &Topic, rid: &RequestId) -> bool {
    reg.subscribers_of(topic)
        .iter()
        .any(|s| &s.session.id == session && &s.request_id == rid)
}

proptest! {
    #[test]
    fn subscribe_then_unsubscribe_removes_pairing(topic_i in 0..5_usize, rid in 0..100_u64) {
        let reg = SubscriptionRegistry::new();
        let (sessions, _rxs) = sessions(1);
        let s = &sessions[0];
        let t = topic(topic_i);
        let r = RequestId::from(rid);
        let _ = reg.subscribe(s, &t, r.clone()).unwrap();
        prop_assert!(holds(&reg, &s.id, &t, &r));
        prop_assert_eq!(reg.unsubscribe(&s.id, &t, Some(&r)), 1);
        prop_assert!(!holds(&reg, &s.id, &t, &r));
    }

    #[test]
    fn subscribing_twice_equals_once(ops in proptest::collection::vec((0..5_usize, 0..3_u64), 1..20)) {
        let once = SubscriptionRegistry::new();
        let twice = SubscriptionRegistry::new();
        let (sessions, _rxs) = sessions(1);
        let s = &sessions[0];
        for (t, r) in &ops {
            let _ = once.subscribe(s, &topic(*t), RequestId::from(*r)).unwrap();
            let _ = twice.subscribe(s, &topic(*t), RequestId::from(*r)).unwrap();
            let _ = twice.subscribe(s, &topic(*t), RequestId::from(*r)).unwrap();
        }
        prop_assert_eq!(once.subscription_count(), twice.subscription_count());
        prop_assert_eq!(once.topics_of(&s.id), twice.topics_of(&s.id));
    }

    #[test]
    fn unsubscribe_all_leaves_no_trace(ops in proptest::collection::vec(op(), 0..40), victim in 0..4_usize) {
        let reg = SubscriptionRegistry::new();
        let (sessions, _rxs) = sessions(4);
        for op in ops {
            match op {
                Op::Subscribe { session, topic: t, rid } => {
                    let _ = reg.subscribe(&sessions[session], &topic(t), RequestId::from(rid)).unwrap();
                }
                Op::Unsubscribe { session, topic: t, rid } => {
                    let rid = rid.map(RequestId::from);
                    let _ = reg.unsubscribe(&sessions[session].id, &topic(t), rid.as_ref());
                }
                Op::UnsubscribeAll { session } => {
                    let _ = reg.unsubscribe_all(&sessions[session].id);
                }
            }
        }

        let victim = &sessions[victim].id;
        let _ = reg.unsubscribe_all(victim);
        for t in 0..5 {
            prop_assert!(reg.subscribers_of(&topic(t)).iter().all(|s| &s.session.id != victim));
        }
        prop_assert!(reg.topics_of(victim).is_empty());

        // Both indexes agree on the total.
        let from_sessions: usize = sessions
            .iter()
            .flat_map(|s| reg.topics_of(&s.id))
            .map(|(_, rids)| rids.len())
            .sum();
        prop_assert_eq!(from_sessions, reg.subscription_count());
    }
}
