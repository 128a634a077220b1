//! Read-only snapshots of a node's specialization state, for tests and tools.

use serde::Serialize;

use crate::chain::EntryKind;
use crate::cost::NodeCost;
use crate::error::{Error, Result};
use crate::guard::CachedView;
use crate::node::SpecializedNode;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeIntrospection {
    pub node: String,
    pub cost: NodeCost,
    pub collapsed: bool,
    /// One record per declared rule, in declaration order.
    pub specializations: Vec<SpecializationInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecializationInfo {
    pub name: String,
    pub active: bool,
    /// Superseded, or excluded for at least one argument shape.
    pub excluded: bool,
    /// Cached values of each activation, in chain order.
    pub instances: Vec<Vec<CachedValueInfo>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedValueInfo {
    pub name: String,
    pub value: Value,
}

impl NodeIntrospection {
    pub fn specialization(&self, name: &str) -> Option<&SpecializationInfo> {
        self.specializations.iter().find(|info| info.name == name)
    }

    pub fn active_names(&self) -> Vec<&str> {
        self.specializations
            .iter()
            .filter(|info| info.active)
            .map(|info| info.name.as_str())
            .collect()
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|err| Error::Generic(err.to_string()))
    }
}

impl SpecializedNode {
    pub fn introspect(&self) -> NodeIntrospection {
        let chain = self.chain.load_full();
        let specializations = self
            .kind
            .rules
            .iter()
            .map(|rule| {
                let instances: Vec<Vec<CachedValueInfo>> = chain
                    .entries
                    .iter()
                    .filter_map(|entry| match &entry.kind {
                        EntryKind::Activation { rule: id, values } if *id == rule.id => {
                            let view = CachedView::installed(values, &chain.inline, &rule.locations);
                            Some(
                                rule.slots
                                    .iter()
                                    .enumerate()
                                    .map(|(index, slot)| CachedValueInfo {
                                        name: slot.name.clone(),
                                        value: view.get(index).cloned().unwrap_or(Value::Null),
                                    })
                                    .collect(),
                            )
                        }
                        _ => None,
                    })
                    .collect();
                SpecializationInfo {
                    name: rule.name.clone(),
                    active: !instances.is_empty(),
                    excluded: chain.superseded.contains(&rule.id)
                        || chain.excluded.iter().any(|(id, _)| *id == rule.id),
                    instances,
                }
            })
            .collect();

        NodeIntrospection {
            node: self.kind.name.clone(),
            cost: self.cost(),
            collapsed: chain.collapsed,
            specializations,
        }
    }
}
