//! # Epoch Flows
//!
//! Membership changes driven through the broker hooks, checked from every
//! participant's point of view through the read APIs.
//!
//! ## Flow Tested
//!
//! 1. Three registered users open `a|b|c`
//! 2. `c` leaves: the epoch is archived as `a|b|c#<stamp>-1`
//! 3. `a` and `b` keep talking on a fresh shadow
//! 4. `c` returns: the pair epoch is archived, all three share a new shadow

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kp_01_conversation_store::{
        ChatListEntry, ConversationConfig, ConversationDependencies, ConversationService,
        HistoryApi, InMemoryKVStore, ListingApi, ManualTimeSource, ProfileApi, ProfileBasics,
        UserProfile,
    };
    use kp_runtime::BrokerHooks;

    type Service = ConversationService<InMemoryKVStore, Arc<ManualTimeSource>>;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct World {
        service: Arc<Service>,
        hooks: BrokerHooks<InMemoryKVStore, Arc<ManualTimeSource>>,
        clock: Arc<ManualTimeSource>,
    }

    async fn world(users: &[&str]) -> World {
        let clock = Arc::new(ManualTimeSource::new(1_000));
        let service = Arc::new(ConversationService::new(
            ConversationDependencies {
                kv_store: InMemoryKVStore::new(),
                time_source: Arc::clone(&clock),
            },
            ConversationConfig::default(),
        ));
        for user in users {
            let profile = UserProfile {
                basics: ProfileBasics {
                    id: user.to_string(),
                    first_name: user.to_uppercase(),
                    last_name: "Flow".into(),
                    image: None,
                },
                email: Some(format!("{user}@example.com")),
            };
            service
                .bootstrap_session(profile, format!("chat-{user}"))
                .await
                .unwrap();
        }
        World {
            hooks: BrokerHooks::new(Arc::clone(&service)),
            service,
            clock,
        }
    }

    async fn payloads(w: &World, user: &str, lineage: &str) -> Vec<String> {
        w.service
            .scan(user, lineage, 0, 50)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.payload)
            .collect()
    }

    fn keys(entries: &[ChatListEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    // =============================================================================
    // LEAVE / REJOIN
    // =============================================================================

    #[tokio::test]
    async fn test_leave_then_rejoin_keeps_each_view_honest() {
        let w = world(&["a", "b", "c"]).await;

        w.hooks.on_subscribe("a", "a|b|c", 1).await.unwrap();
        w.hooks.on_publish("a", "c|b|a", "one", 1_100).await.unwrap();
        w.service.settle().await.unwrap();

        w.clock.set(2_000);
        w.hooks.on_unsubscribe("c", "b|a|c").await.unwrap();
        w.hooks.on_publish("b", "a|b|c", "two", 2_100).await.unwrap();
        w.service.settle().await.unwrap();

        // The leaver reads the archived epoch, nothing after.
        let c_rooms = w.service.timeline("c", 0, 10).await.unwrap();
        assert_eq!(keys(&c_rooms), vec!["a|b|c#2000-1"]);
        assert_eq!(payloads(&w, "c", "a|b|c#2000-1").await, vec!["one"]);
        assert!(payloads(&w, "c", "a|b|c").await.is_empty());

        // The remaining pair sees both epochs under separate names.
        assert_eq!(payloads(&w, "a", "a|b|c").await, vec!["two"]);
        assert_eq!(payloads(&w, "b", "a|b|c#2000-1").await, vec!["one"]);

        w.clock.set(3_000);
        w.hooks.on_subscribe("c", "c|a|b", 1).await.unwrap();
        w.hooks.on_publish("c", "a|b|c", "three", 3_100).await.unwrap();
        w.service.settle().await.unwrap();

        for user in ["a", "b", "c"] {
            assert_eq!(payloads(&w, user, "b|c|a").await, vec!["three"]);
        }
        // The pair epoch is readable only by the pair.
        assert_eq!(payloads(&w, "a", "a|b|c#3000-2").await, vec!["two"]);
        assert!(payloads(&w, "c", "a|b|c#3000-2").await.is_empty());
    }

    #[tokio::test]
    async fn test_resubscribe_is_stable_across_permutations() {
        let w = world(&["a", "b", "c"]).await;

        let first = w.hooks.on_subscribe("a", "a|b|c", 1).await.unwrap();
        let again = w.hooks.on_subscribe("b", "c|a|b", 0).await.unwrap();
        let third = w.hooks.on_subscribe("c", "b|c|a", 2).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(again, third);
        let members = w.service.conversation_members("a|c|b").await.unwrap();
        let ids: Vec<_> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    // =============================================================================
    // LISTINGS
    // =============================================================================

    #[tokio::test]
    async fn test_timeline_follows_last_activity() {
        let w = world(&["alice", "bob", "carol", "dave"]).await;
        for topic in ["alice|bob", "alice|carol", "alice|dave"] {
            w.hooks.on_subscribe("alice", topic, 1).await.unwrap();
        }

        w.hooks.on_publish("alice", "carol|alice", "t1", 10).await.unwrap();
        w.hooks.on_publish("alice", "dave|alice", "t2", 20).await.unwrap();
        w.hooks.on_publish("bob", "bob|alice", "t3", 30).await.unwrap();
        w.service.settle().await.unwrap();

        let timeline = w.service.timeline("alice", 0, 10).await.unwrap();
        assert_eq!(keys(&timeline), vec!["alice|bob", "alice|dave", "alice|carol"]);

        w.hooks.on_publish("carol", "alice|carol", "t4", 40).await.unwrap();
        w.service.settle().await.unwrap();

        let timeline = w.service.timeline("alice", 0, 1).await.unwrap();
        assert_eq!(keys(&timeline), vec!["alice|carol"]);
    }

    #[tokio::test]
    async fn test_reconnect_restores_client_labels() {
        let w = world(&["alice", "bob", "carol"]).await;
        w.hooks.on_subscribe("alice", "bob|alice", 2).await.unwrap();
        w.hooks.on_subscribe("alice", "alice|bob|carol", 0).await.unwrap();

        w.hooks.on_disconnect("alice").await.unwrap();
        let targets = w.hooks.resubscribe_targets("alice").await.unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets.get("bob|alice"), Some(&2));
        assert_eq!(targets.get("alice|bob|carol"), Some(&0));
    }
}
