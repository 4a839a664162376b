use crate::action::PatchType;
use crate::Result;
use serde_json::Value;

/// Apply a patch document to an object in place.
///
/// Strategic merge and server-side apply need schema knowledge and field
/// ownership tracking; both are approximated with a JSON merge patch.
pub fn apply_patch(existing: &mut Value, patch: &Value, patch_type: PatchType) -> Result<()> {
    match patch_type {
        PatchType::JsonPatch => {
            let operations: json_patch::Patch = serde_json::from_value(patch.clone())?;
            json_patch::patch(existing, &operations)?;
        }
        PatchType::MergePatch | PatchType::StrategicMergePatch | PatchType::ApplyPatch => {
            json_patch::merge(existing, patch);
        }
    }
    Ok(())
}
