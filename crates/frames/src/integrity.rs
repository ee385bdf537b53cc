//! Referential integrity for parent deletes
//!
//! The store enforces no foreign keys, so a parent's declared child
//! relations are honored here, one relation at a time, before the parent
//! document is removed.
//!
//! For each relation the child's back-reference is discovered first: the
//! child attribute that references the parent model, either directly
//! (single-valued) or inside an array (multi-valued). The action then runs:
//!
//! | Action      | Multi-valued              | Single-valued, child has relations | Single-valued, leaf child |
//! |-------------|---------------------------|------------------------------------|---------------------------|
//! | CASCADE     | pull parent id            | delete each child                  | delete all in one call    |
//! | RESTRICT    | refuse if referenced      | refuse if referenced               | refuse if referenced      |
//! | SET_NULL    | pull parent id            | delete each child                  | set reference to null     |
//! | SET_DEFAULT | pull parent id            | delete each child                  | set reference to default  |
//!
//! Children deleted one by one go through their own delete chain, so their
//! relations run too and a grandchild's RESTRICT can refuse the whole delete.

use framedb_core::Value;
use framedb_store::{Database, Filter, FindOptions, SessionId, UpdateSpec};
use tracing::{info, warn};

use crate::error::{FrameError, FrameResult};
use crate::frame::Frame;
use crate::schema::{ChildRelation, OnDelete, Schema};

/// Child attribute pointing back at the parent
#[derive(Debug, Clone, PartialEq)]
pub struct ParentKey {
    /// Attribute name on the child
    pub name: String,
    /// True for an array of references
    pub multi: bool,
    /// The attribute's declared default
    pub default: Value,
}

/// Find the attribute of `child` that references `parent`
pub fn parent_key(parent: &Schema, child: &Schema) -> FrameResult<ParentKey> {
    child
        .attributes()
        .iter()
        .find_map(|attribute| {
            let (target, multi) = attribute.kind().reference_target()?;
            target.matches(parent).then(|| ParentKey {
                name: attribute.name().to_string(),
                multi,
                default: attribute.initial_value(),
            })
        })
        .ok_or_else(|| FrameError::RelationNotFound {
            parent: parent.name().to_string(),
            child: child.name().to_string(),
        })
}

/// Run one relation's action for `parent` within `session`; `false` means
/// refused
pub(crate) async fn run_action(
    parent: &Frame,
    relation: &ChildRelation,
    db: &Database,
    session: Option<SessionId>,
) -> FrameResult<bool> {
    let child = relation.child();
    let key = parent_key(parent.schema(), child)?;
    let Some(parent_id) = parent.id().cloned() else {
        return Ok(true);
    };
    let parent_id = parent_id.into_object_id_if_parseable();
    let filter = Filter::eq(key.name.as_str(), parent_id.clone());
    let collection = db.collection_in(child.collection(), session);
    let action = relation.on_delete();

    if action == OnDelete::Restrict {
        let referencing = collection.count_documents(&filter).await?;
        if referencing > 0 {
            warn!(
                parent = %parent.schema().name(),
                child = %child.name(),
                key = %key.name,
                referencing,
                "RESTRICT: children still reference parent"
            );
            return Ok(false);
        }
        return Ok(true);
    }

    if key.multi {
        let update = UpdateSpec::new().pull(key.name.as_str(), parent_id);
        let result = collection.update_many(&filter, &update).await?;
        info!(
            %action,
            child = %child.name(),
            key = %key.name,
            modified = result.modified_count,
            "Removed parent from reference arrays"
        );
        return Ok(true);
    }

    if child.has_relations() {
        return delete_children(child, &filter, db, session).await;
    }

    match action {
        OnDelete::Cascade => {
            let result = collection.delete_many(&filter).await?;
            info!(
                child = %child.name(),
                key = %key.name,
                deleted = result.deleted_count,
                "CASCADE: deleted children"
            );
        }
        OnDelete::SetNull | OnDelete::SetDefault => {
            let replacement = if action == OnDelete::SetNull {
                Value::Null
            } else {
                key.default.clone()
            };
            let update = UpdateSpec::new().set_field(key.name.as_str(), replacement);
            let result = collection.update_many(&filter, &update).await?;
            info!(
                %action,
                child = %child.name(),
                key = %key.name,
                modified = result.modified_count,
                "Reset child references"
            );
        }
        OnDelete::Restrict => {}
    }
    Ok(true)
}

/// Delete matching children one at a time through their own delete chain
async fn delete_children(
    child: &'static Schema,
    filter: &Filter,
    db: &Database,
    session: Option<SessionId>,
) -> FrameResult<bool> {
    let documents = db
        .collection_in(child.collection(), session)
        .find_all(filter, &FindOptions::new())
        .await?;
    info!(child = %child.name(), count = documents.len(), "Deleting children individually");
    for document in documents {
        let frame = Frame::loaded(child, document);
        if !frame.delete_in_chain(db, session).await? {
            return Ok(false);
        }
    }
    Ok(true)
}
