#[cfg(test)]
mod tests {
    use crate::action::*;
    use crate::selector::ListRestrictions;
    use crate::types;
    use kube::api::Patch;
    use serde_json::json;

    #[test]
    fn test_matches_with_wildcards() {
        let action = Action::get(&types::gvr(), "default", "events");

        assert!(action.matches("get", "inmemorychannels"));
        assert!(action.matches("*", "inmemorychannels"));
        assert!(action.matches("get", "*"));
        assert!(action.matches("*", "*"));
        assert!(!action.matches("list", "inmemorychannels"));
        assert!(!action.matches("get", "subscriptions"));
    }

    #[test]
    fn test_update_status_action() {
        let object = json!({ "metadata": { "name": "events" } });
        let action =
            Action::update_subresource(&types::gvr(), "status", "default", object.clone());

        assert_eq!(action.verb, Verb::Update);
        assert!(action.is_status());
        assert_eq!(action.name(), Some("events"));
        assert_eq!(action.object(), Some(&object));
        assert!(action.restrictions().is_none());
        assert!(!Action::update(&types::gvr(), "default", object).is_status());
    }

    #[test]
    fn test_list_action_carries_kind_and_restrictions() {
        let restrictions = ListRestrictions::new(Some("app=dispatcher"), None).unwrap();
        let action = Action::list(&types::gvr(), &types::gvk(), "default", restrictions.clone());

        assert_eq!(action.kind, Some(types::gvk()));
        assert_eq!(action.restrictions(), Some(&restrictions));
        assert_eq!(action.name(), None);
    }

    #[test]
    fn test_patch_action_subresources() {
        let data = PatchData {
            name: "events".to_string(),
            patch_type: PatchType::MergePatch,
            patch: json!({ "spec": {} }),
        };

        let plain = Action::patch_subresource(&types::gvr(), "default", data.clone(), &[]);
        assert_eq!(plain.subresource, None);
        assert_eq!(plain.name(), Some("events"));
        assert_eq!(plain.patch(), Some(&data));

        let status = Action::patch_subresource(&types::gvr(), "default", data, &["status"]);
        assert!(status.is_status());
    }

    #[test]
    fn test_patch_data_from_kube() {
        let merge = PatchData::from_kube("events", &Patch::Merge(json!({ "a": 1 }))).unwrap();
        assert_eq!(merge.patch_type, PatchType::MergePatch);
        assert_eq!(merge.patch, json!({ "a": 1 }));

        let apply = PatchData::from_kube("events", &Patch::Apply(json!({}))).unwrap();
        assert_eq!(apply.patch_type, PatchType::ApplyPatch);

        let ops: json_patch::Patch = serde_json::from_value(json!([
            { "op": "add", "path": "/metadata/labels", "value": {} }
        ]))
        .unwrap();
        let json = PatchData::from_kube("events", &Patch::<()>::Json(ops)).unwrap();
        assert_eq!(json.patch_type, PatchType::JsonPatch);
        assert!(json.patch.is_array());
    }

    #[test]
    fn test_patch_type_from_content_type() {
        assert_eq!(
            PatchType::from_content_type(Some("application/json-patch+json")),
            PatchType::JsonPatch
        );
        assert_eq!(
            PatchType::from_content_type(Some("application/merge-patch+json; charset=utf-8")),
            PatchType::MergePatch
        );
        assert_eq!(
            PatchType::from_content_type(Some("application/apply-patch+yaml")),
            PatchType::ApplyPatch
        );
        assert_eq!(
            PatchType::from_content_type(None),
            PatchType::StrategicMergePatch
        );
        for patch_type in [
            PatchType::JsonPatch,
            PatchType::MergePatch,
            PatchType::StrategicMergePatch,
            PatchType::ApplyPatch,
        ] {
            assert_eq!(
                PatchType::from_content_type(Some(patch_type.content_type())),
                patch_type
            );
        }
    }

    #[test]
    fn test_display() {
        let action = Action::delete(&types::gvr(), "default", "events");
        assert_eq!(
            action.to_string(),
            "delete messaging.knative.dev/v1beta1/inmemorychannels in default (events)"
        );

        let status = Action::get_subresource(&types::gvr(), "status", "", "events");
        assert_eq!(
            status.to_string(),
            "get messaging.knative.dev/v1beta1/inmemorychannels/status (events)"
        );
    }
}
