//! External collaborators consumed by the booking engine. The engine only
//! asks whether an identity exists (and for equipment, its label); member
//! and equipment management live elsewhere.

use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;

use crate::model::{EquipmentId, MemberId};

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn exists(&self, member_id: MemberId) -> bool;
}

#[async_trait]
pub trait EquipmentCatalog: Send + Sync {
    async fn exists(&self, equipment_id: EquipmentId) -> bool;
    async fn label(&self, equipment_id: EquipmentId) -> Option<String>;
}

/// Fixed member set, for tests and embedders with preloaded directories.
#[derive(Debug, Default)]
pub struct StaticMemberDirectory {
    members: HashSet<MemberId>,
}

impl StaticMemberDirectory {
    pub fn new(members: impl IntoIterator<Item = MemberId>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }
}

#[async_trait]
impl MemberDirectory for StaticMemberDirectory {
    async fn exists(&self, member_id: MemberId) -> bool {
        self.members.contains(&member_id)
    }
}

/// Fixed equipment set with device-type labels.
#[derive(Debug, Default)]
pub struct StaticEquipmentCatalog {
    equipment: HashMap<EquipmentId, String>,
}

impl StaticEquipmentCatalog {
    pub fn new<L: Into<String>>(equipment: impl IntoIterator<Item = (EquipmentId, L)>) -> Self {
        Self {
            equipment: equipment
                .into_iter()
                .map(|(id, label)| (id, label.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl EquipmentCatalog for StaticEquipmentCatalog {
    async fn exists(&self, equipment_id: EquipmentId) -> bool {
        self.equipment.contains_key(&equipment_id)
    }

    async fn label(&self, equipment_id: EquipmentId) -> Option<String> {
        self.equipment.get(&equipment_id).cloned()
    }
}
