//! Tests for the typed InMemoryChannel fake client

#[cfg(test)]
mod tests {
    use crate::action::{PatchType, Verb};
    use crate::types::{
        Addressable, Condition, InMemoryChannel, InMemoryChannelSpec, InMemoryChannelStatus,
        SubscriberSpec,
    };
    use crate::{ClientBuilder, Clientset, Error, InMemoryChannelInterface};
    use futures::StreamExt;
    use kube::api::{
        DeleteParams, GetParams, ListParams, Patch, PatchParams, PostParams, WatchEvent,
        WatchParams,
    };
    use kube::ResourceExt;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn channel(name: &str, labels: &[(&str, &str)]) -> InMemoryChannel {
        let mut channel = InMemoryChannel::new(
            name,
            InMemoryChannelSpec {
                subscribers: Some(vec![SubscriberSpec {
                    uid: Some("sub-1".to_string()),
                    subscriber_uri: Some("http://receiver.default.svc".to_string()),
                    ..Default::default()
                }]),
                delivery: None,
            },
        );
        channel.metadata.labels = Some(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        channel
    }

    fn ready_status() -> InMemoryChannelStatus {
        InMemoryChannelStatus {
            observed_generation: Some(1),
            address: Some(Addressable {
                url: Some("http://events-kn-channel.default.svc.cluster.local".to_string()),
            }),
            conditions: Some(vec![Condition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let clientset = Clientset::new();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let created = channels
            .create(&channel("events", &[]), &PostParams::default())
            .await
            .unwrap();
        assert_eq!(created.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));
        assert_eq!(created.metadata.generation, Some(1));

        let fetched = channels
            .get("events", &GetParams::default())
            .await
            .unwrap();
        assert_eq!(fetched, created);

        let actions = clientset.actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].verb, Verb::Create);
        assert_eq!(actions[1].verb, Verb::Get);
        assert_eq!(actions[1].namespace, "default");
        assert_eq!(actions[1].name(), Some("events"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let clientset = Clientset::new();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let err = channels
            .get("missing", &GetParams::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_duplicate_is_already_exists() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[]))
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let err = channels
            .create(&channel("events", &[]), &PostParams::default())
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace_and_labels() {
        let mut elsewhere = channel("elsewhere", &[("app", "dispatcher")]);
        elsewhere.metadata.namespace = Some("other".to_string());

        let clientset = ClientBuilder::new()
            .with_objects(vec![
                channel("a", &[("app", "dispatcher")]),
                channel("b", &[("app", "ingress")]),
                elsewhere,
            ])
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let all = channels.list(&ListParams::default()).await.unwrap();
        assert_eq!(all.items.len(), 2);
        assert!(all.metadata.resource_version.is_some());

        let dispatchers = channels
            .list(&ListParams::default().labels("app=dispatcher"))
            .await
            .unwrap();
        let names: Vec<String> = dispatchers.items.iter().map(|c| c.name_any()).collect();
        assert_eq!(names, vec!["a".to_string()]);

        let everywhere = clientset.messaging_v1beta1().in_memory_channels("");
        let all_namespaces = everywhere
            .list(&ListParams::default().labels("app=dispatcher"))
            .await
            .unwrap();
        assert_eq!(all_namespaces.items.len(), 2);
    }

    #[tokio::test]
    async fn test_list_filters_reactor_results_by_label() {
        let clientset = ClientBuilder::new()
            .with_reactor("list", "inmemorychannels", |_| {
                Ok(Some(json!({
                    "apiVersion": "messaging.knative.dev/v1beta1",
                    "kind": "InMemoryChannelList",
                    "metadata": { "resourceVersion": "17" },
                    "items": [
                        serde_json::to_value(channel("keep", &[("app", "dispatcher")]))?,
                        serde_json::to_value(channel("drop", &[("app", "other")]))?,
                    ],
                })))
            })
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let list = channels
            .list(&ListParams::default().labels("app=dispatcher"))
            .await
            .unwrap();
        assert_eq!(list.metadata.resource_version.as_deref(), Some("17"));
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].name_any(), "keep");
    }

    #[tokio::test]
    async fn test_update_bumps_generation_on_spec_change() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[]))
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let mut current = channels
            .get("events", &GetParams::default())
            .await
            .unwrap();
        current.spec.subscribers = None;

        let updated = channels
            .update(&current, &PostParams::default())
            .await
            .unwrap();
        assert_eq!(updated.metadata.generation, Some(2));
        assert!(updated.spec.subscribers.is_none());

        // The stale copy conflicts
        let err = channels
            .update(&current, &PostParams::default())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_status_with_status_subresource() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[]))
            .with_status_subresource::<InMemoryChannel>()
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let mut current = channels
            .get("events", &GetParams::default())
            .await
            .unwrap();
        current.status = Some(ready_status());
        current.spec.subscribers = None;

        let updated = channels
            .update_status(&current, &PostParams::default())
            .await
            .unwrap();
        assert!(updated.is_ready());
        // Spec changes are ignored through the status subresource
        assert!(updated.spec.subscribers.is_some());
        assert_eq!(updated.metadata.generation, Some(1));

        let action = clientset.actions().pop().unwrap();
        assert_eq!(action.verb, Verb::Update);
        assert_eq!(action.subresource.as_deref(), Some("status"));
    }

    #[tokio::test]
    async fn test_regular_update_keeps_status_with_status_subresource() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[]))
            .with_status_subresource::<InMemoryChannel>()
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let mut current = channels
            .get("events", &GetParams::default())
            .await
            .unwrap();
        current.status = Some(ready_status());

        let updated = channels
            .update(&current, &PostParams::default())
            .await
            .unwrap();
        assert!(updated.status.is_none());
        assert!(!updated.is_ready());
    }

    #[tokio::test]
    async fn test_delete() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[]))
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        channels
            .delete("events", &DeleteParams::default())
            .await
            .unwrap();
        assert!(channels
            .get("events", &GetParams::default())
            .await
            .unwrap_err()
            .is_not_found());

        let err = channels
            .delete("events", &DeleteParams::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_collection_honours_selector() {
        let clientset = ClientBuilder::new()
            .with_objects(vec![
                channel("a", &[("app", "dispatcher")]),
                channel("b", &[("app", "dispatcher")]),
                channel("c", &[("app", "ingress")]),
            ])
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        channels
            .delete_collection(
                &DeleteParams::default(),
                &ListParams::default().labels("app=dispatcher"),
            )
            .await
            .unwrap();

        let remaining = channels.list(&ListParams::default()).await.unwrap();
        let names: Vec<String> = remaining.items.iter().map(|c| c.name_any()).collect();
        assert_eq!(names, vec!["c".to_string()]);

        let action = &clientset.actions()[0];
        assert_eq!(action.verb, Verb::DeleteCollection);
        assert!(action.restrictions().is_some());
    }

    #[tokio::test]
    async fn test_merge_patch() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[("app", "dispatcher")]))
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let patch = Patch::Merge(json!({
            "metadata": { "labels": { "tier": "edge" } },
            "spec": { "delivery": { "retry": 3 } }
        }));
        let patched = channels
            .patch("events", &patch, &PatchParams::default(), &[])
            .await
            .unwrap();

        assert_eq!(patched.labels().get("app").map(String::as_str), Some("dispatcher"));
        assert_eq!(patched.labels().get("tier").map(String::as_str), Some("edge"));
        assert_eq!(
            patched.spec.delivery.as_ref().and_then(|d| d.retry),
            Some(3)
        );

        let action = clientset.actions().pop().unwrap();
        assert_eq!(action.verb, Verb::Patch);
        assert_eq!(action.patch().unwrap().patch_type, PatchType::MergePatch);
    }

    #[tokio::test]
    async fn test_json_patch() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[("app", "dispatcher")]))
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let ops: json_patch::Patch = serde_json::from_value(json!([
            { "op": "remove", "path": "/metadata/labels/app" },
            { "op": "add", "path": "/metadata/labels/env", "value": "prod" }
        ]))
        .unwrap();
        let patched = channels
            .patch("events", &Patch::Json(ops), &PatchParams::default(), &[])
            .await
            .unwrap();

        assert!(patched.labels().get("app").is_none());
        assert_eq!(patched.labels().get("env").map(String::as_str), Some("prod"));
    }

    #[tokio::test]
    async fn test_patch_status_subresource() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[]))
            .with_status_subresource::<InMemoryChannel>()
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let patch = Patch::Merge(json!({
            "spec": { "subscribers": [] },
            "status": { "address": { "url": "http://events.default.svc" } }
        }));
        let patched = channels
            .patch("events", &patch, &PatchParams::default(), &["status"])
            .await
            .unwrap();

        assert_eq!(
            patched.status.and_then(|s| s.address).and_then(|a| a.url).as_deref(),
            Some("http://events.default.svc")
        );
        assert_eq!(patched.spec.subscribers.map(|s| s.len()), Some(1));
    }

    #[tokio::test]
    async fn test_patch_missing_is_not_found() {
        let clientset = Clientset::new();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let err = channels
            .patch(
                "missing",
                &Patch::Merge(json!({})),
                &PatchParams::default(),
                &[],
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_apply_patch_creates_missing_object() {
        let clientset = Clientset::new();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let patch = Patch::Apply(json!({
            "apiVersion": "messaging.knative.dev/v1beta1",
            "kind": "InMemoryChannel",
            "spec": { "delivery": { "retry": 1 } }
        }));
        let applied = channels
            .patch("events", &patch, &PatchParams::apply("tests"), &[])
            .await
            .unwrap();

        assert_eq!(applied.name_any(), "events");
        assert_eq!(applied.metadata.resource_version.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_watch_receives_changes() {
        let clientset = Clientset::new();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let mut events = channels.watch(&WatchParams::default()).await.unwrap();

        let created = channels
            .create(&channel("events", &[]), &PostParams::default())
            .await
            .unwrap();
        channels
            .update(&created, &PostParams::default())
            .await
            .unwrap();
        channels
            .delete("events", &DeleteParams::default())
            .await
            .unwrap();

        match events.next().await.unwrap().unwrap() {
            WatchEvent::Added(channel) => assert_eq!(channel.name_any(), "events"),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            events.next().await.unwrap().unwrap(),
            WatchEvent::Modified(_)
        ));
        assert!(matches!(
            events.next().await.unwrap().unwrap(),
            WatchEvent::Deleted(_)
        ));
        assert_eq!(clientset.actions()[0].verb, Verb::Watch);
    }

    #[tokio::test]
    async fn test_watch_honours_label_selector() {
        let clientset = Clientset::new();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let mut events = channels
            .watch(&WatchParams::default().labels("app=dispatcher"))
            .await
            .unwrap();

        channels
            .create(&channel("ignored", &[("app", "ingress")]), &PostParams::default())
            .await
            .unwrap();
        channels
            .create(&channel("seen", &[("app", "dispatcher")]), &PostParams::default())
            .await
            .unwrap();

        match events.next().await.unwrap().unwrap() {
            WatchEvent::Added(channel) => assert_eq!(channel.name_any(), "seen"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reactor_error_is_propagated_unchanged() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[]))
            .with_reactor("update", "inmemorychannels", |action| {
                if action.is_status() {
                    Err(Error::Conflict("status is being written".to_string()))
                } else {
                    Ok(None)
                }
            })
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let current = channels
            .get("events", &GetParams::default())
            .await
            .unwrap();

        let err = channels
            .update_status(&current, &PostParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref msg) if msg == "status is being written"));

        // Plain updates fall through to the tracker
        assert!(channels
            .update(&current, &PostParams::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_prepended_reactor_overrides_tracker() {
        let clientset = ClientBuilder::new()
            .with_object(channel("events", &[]))
            .build()
            .unwrap();
        clientset
            .fake()
            .prepend_reactor("get", "inmemorychannels", |_| {
                Ok(Some(serde_json::to_value(channel("canned", &[]))?))
            });
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let fetched = channels
            .get("events", &GetParams::default())
            .await
            .unwrap();
        assert_eq!(fetched.name_any(), "canned");
    }

    #[tokio::test]
    async fn test_unhandled_action_reports_no_reaction() {
        let clientset = Clientset::new();
        let fake = crate::fake::Fake::new(clientset.tracker().clone());
        let channels =
            crate::FakeInMemoryChannels::new(std::sync::Arc::new(fake), "default");

        let err = channels
            .get("events", &GetParams::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NoReaction { ref verb, ref resource } if verb == "get" && resource == "inmemorychannels"
        ));
    }

    #[tokio::test]
    async fn test_undecodable_reaction_is_an_error() {
        let clientset = ClientBuilder::new()
            .with_reactor("get", "*", |_| Ok(Some(json!("not a channel"))))
            .build()
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let err = channels
            .get("events", &GetParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SerializationError(_)));
    }

    #[tokio::test]
    async fn test_stored_channel_without_spec_decodes() {
        let clientset = Clientset::new();
        clientset
            .tracker()
            .add(
                &crate::types::gvr(),
                &crate::types::gvk(),
                json!({
                    "apiVersion": "messaging.knative.dev/v1beta1",
                    "kind": "InMemoryChannel",
                    "metadata": { "name": "bare" }
                }),
                "default",
            )
            .unwrap();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let fetched = channels.get("bare", &GetParams::default()).await.unwrap();
        assert_eq!(fetched.spec, InMemoryChannelSpec::default());

        let list = channels.list(&ListParams::default()).await.unwrap();
        assert_eq!(list.items.len(), 1);
    }

    #[tokio::test]
    async fn test_all_namespaces_client_writes_to_object_namespace() {
        let clientset = Clientset::new();
        let all = clientset.messaging_v1beta1().in_memory_channels("");

        let mut events = channel("events", &[]);
        events.metadata.namespace = Some("team-a".to_string());
        let created = all.create(&events, &PostParams::default()).await.unwrap();
        assert_eq!(created.namespace().as_deref(), Some("team-a"));

        let team_a = clientset.messaging_v1beta1().in_memory_channels("team-a");
        assert!(team_a.get("events", &GetParams::default()).await.is_ok());
        assert_eq!(
            team_a.list(&ListParams::default()).await.unwrap().items.len(),
            1
        );

        let mut updated = created.clone();
        updated.spec.delivery = Some(Default::default());
        let updated = all.update(&updated, &PostParams::default()).await.unwrap();
        assert_eq!(updated.namespace().as_deref(), Some("team-a"));

        // Nothing to fall back on without a namespace on the object
        let err = all
            .create(&channel("orphan", &[]), &PostParams::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid());
    }

    #[tokio::test]
    async fn test_apply_patch_with_scalar_metadata_is_invalid() {
        let clientset = Clientset::new();
        let channels = clientset.messaging_v1beta1().in_memory_channels("default");

        let err = channels
            .patch(
                "events",
                &Patch::Apply(json!({
                    "apiVersion": "messaging.knative.dev/v1beta1",
                    "kind": "InMemoryChannel",
                    "metadata": "oops"
                })),
                &PatchParams::apply("tests"),
                &[],
            )
            .await
            .unwrap_err();
        assert!(err.is_invalid());
        assert!(clientset.tracker().list(&crate::types::gvr(), None).unwrap().is_empty());
    }
}
