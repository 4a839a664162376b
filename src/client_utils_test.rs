#[cfg(test)]
mod tests {
    use crate::client_utils::*;
    use crate::tracker::GVK;
    use serde_json::json;

    #[test]
    fn test_pluralize_knative_kinds() {
        #[rustfmt::skip]
        let kinds = vec![
            ("InMemoryChannel", "inmemorychannels"),
            ("Channel", "channels"),
            ("Subscription", "subscriptions"),
            ("Broker", "brokers"), ("Trigger", "triggers"),
            ("Parallel", "parallels"), ("Sequence", "sequences"),
            ("EventPolicy", "eventpolicies"),
            ("ApiServerSource", "apiserversources"),
            ("KafkaChannel", "kafkachannels"),
        ];

        for (kind, expected_plural) in kinds {
            assert_eq!(
                pluralize(kind),
                expected_plural,
                "Failed to pluralize {} correctly",
                kind
            );
        }
    }

    #[test]
    fn test_pluralize_irregular_kinds() {
        assert_eq!(pluralize("Endpoints"), "endpoints");
        assert_eq!(pluralize("Ingress"), "ingresses");
        assert_eq!(pluralize("Gateway"), "gateways");
        assert_eq!(pluralize("NodeMetrics"), "nodes");
    }

    #[test]
    fn test_extract_gvk() {
        let obj = json!({
            "apiVersion": "messaging.knative.dev/v1beta1",
            "kind": "InMemoryChannel",
            "metadata": { "name": "events" }
        });
        assert_eq!(
            extract_gvk(&obj).unwrap(),
            GVK::new("messaging.knative.dev", "v1beta1", "InMemoryChannel")
        );

        let core = json!({ "apiVersion": "v1", "kind": "ConfigMap" });
        assert_eq!(extract_gvk(&core).unwrap().group, "");

        assert!(extract_gvk(&json!({ "kind": "ConfigMap" })).is_err());
    }

    #[test]
    fn test_ensure_type_meta_keeps_existing_values() {
        let gvk = GVK::new("messaging.knative.dev", "v1beta1", "InMemoryChannel");

        let mut bare = json!({ "metadata": { "name": "events" } });
        ensure_type_meta(&mut bare, &gvk);
        assert_eq!(bare["apiVersion"], "messaging.knative.dev/v1beta1");
        assert_eq!(bare["kind"], "InMemoryChannel");

        let mut typed = json!({ "apiVersion": "v1", "kind": "ConfigMap" });
        ensure_type_meta(&mut typed, &gvk);
        assert_eq!(typed["kind"], "ConfigMap");
    }

    #[test]
    fn test_set_object_name() {
        let mut empty = json!({});
        set_object_name(&mut empty, "events").unwrap();
        assert_eq!(empty["metadata"]["name"], "events");

        let mut null_meta = json!({ "metadata": null });
        set_object_name(&mut null_meta, "events").unwrap();
        assert_eq!(null_meta["metadata"]["name"], "events");

        let mut scalar_meta = json!({ "metadata": "oops" });
        let err = set_object_name(&mut scalar_meta, "events").unwrap_err();
        assert!(err.is_invalid());

        assert!(set_object_name(&mut json!([1, 2]), "events").is_err());
    }
}
