//! Info blocks: profiles and rules attached to a node.

use rosterforge_core::{FieldValue, InfoDef};

use super::NodeState;
use crate::reactive::Target;

/// Derived view of one info block.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoState {
    pub(crate) def: InfoDef,
    pub(crate) extra: bool,
    pub(crate) name: String,
    pub(crate) hidden: bool,
    pub(crate) characteristics: Vec<(String, String)>,
}

impl InfoState {
    pub(crate) fn new(def: InfoDef, extra: bool) -> Self {
        Self {
            name: def.name.clone(),
            hidden: def.hidden,
            characteristics: def.characteristics.clone(),
            def,
            extra,
        }
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Whether the block was attached by the host rather than the definition.
    pub fn is_extra(&self) -> bool {
        self.extra
    }

    pub fn characteristics(&self) -> &[(String, String)] {
        &self.characteristics
    }

    pub fn characteristic(&self, type_id: &str) -> Option<&str> {
        self.characteristics
            .iter()
            .find(|(t, _)| t == type_id)
            .map(|(_, v)| v.as_str())
    }
}

impl NodeState {
    /// Recomputes one info field. Returns `true` if it changed.
    pub(crate) fn rederive_info(&mut self, index: usize, field: &str) -> bool {
        let target = Target::Info(index);
        let Some(info) = self.info.get(index) else {
            return false;
        };
        match field {
            "name" => {
                let default = FieldValue::Text(info.def.name.clone());
                let name = self.fold(target, Some(field), default).as_text();
                let info = &mut self.info[index];
                let changed = info.name != name;
                info.name = name;
                changed
            }
            "hidden" => {
                let default = FieldValue::Bool(info.def.hidden);
                let hidden = self.fold(target, Some(field), default).as_bool();
                let info = &mut self.info[index];
                let changed = info.hidden != hidden;
                info.hidden = hidden;
                changed
            }
            type_id => {
                let Some(default) = info
                    .def
                    .characteristics
                    .iter()
                    .find(|(t, _)| t == type_id)
                    .map(|(_, v)| v.clone())
                else {
                    return false;
                };
                let value = self
                    .fold(target, Some(type_id), FieldValue::Text(default))
                    .as_text();
                let info = &mut self.info[index];
                match info.characteristics.iter_mut().find(|(t, _)| t == type_id) {
                    Some(slot) if slot.1 != value => {
                        slot.1 = value;
                        true
                    }
                    _ => false,
                }
            }
        }
    }
}
