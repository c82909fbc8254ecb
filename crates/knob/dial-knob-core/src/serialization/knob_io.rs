use std::sync::atomic::Ordering;

use dial_api_core::json::{value_from_json, value_to_json};
use dial_api_core::{DimView, KnobHandle, KnobKind, TypedValue, ValueKind, ViewId};
use dial_curve_core::{Curve, StringAnimation};

use super::record::{KnobRecord, MasterRecord, ValueRecord};
use crate::document::Document;
use crate::error::{KnobError, SerializationError};
use crate::knob::{Knob, KnobExtra};
use crate::links::{Binding, PendingLink};
use crate::sync::{lock, read, write};
use crate::value_store::{ChannelState, ValueChangedReason};

type SerResult<T> = std::result::Result<T, SerializationError>;

/// A value record checked against the live knob, ready to apply.
struct ChannelLoad {
    dv: DimView,
    enabled: bool,
    state: ChannelState,
    default: Option<TypedValue>,
    pending: Option<PendingLink>,
}

fn parse_channel(
    knob: &Knob,
    record: &ValueRecord,
    dv: DimView,
) -> SerResult<ChannelLoad> {
    let kind = knob.kind.value_kind();
    let bad = |e: dial_api_core::json::JsonError| SerializationError::malformed(&knob.name, e.to_string());
    let value = value_from_json(kind, &record.value).map_err(bad)?;
    let default = record
        .default
        .as_ref()
        .map(|d| value_from_json(kind, d))
        .transpose()
        .map_err(bad)?;

    let (mut curve, mut strings) = (None, None);
    if record.has_animation && !knob.kind.can_animate() {
        log::debug!("{}: ignoring keys on a knob that cannot animate", knob.name);
    } else if record.has_animation {
        match kind {
            ValueKind::String => {
                let keys = record.strings_animation.as_ref().ok_or_else(|| {
                    SerializationError::malformed(&knob.name, "HasAnimation without StringsAnimation")
                })?;
                let mut anim = StringAnimation::new();
                for key in keys {
                    anim.set_key(key.time, key.value.clone());
                }
                strings = Some(anim);
            }
            _ => {
                let c: &Curve = record.curve.as_ref().ok_or_else(|| {
                    SerializationError::malformed(&knob.name, "HasAnimation without Curve")
                })?;
                curve = Some(c.clone());
            }
        }
    }

    let pending = if record.has_master {
        let m: &MasterRecord = record.master.as_ref().ok_or_else(|| {
            SerializationError::malformed(&knob.name, "HasMaster without Master")
        })?;
        Some(PendingLink::Master {
            dv,
            node: m.master_node_name.clone(),
            knob: m.master_knob_name.clone(),
            master_dim: m.master_dimension,
            master_view: ViewId(m.master_view),
        })
    } else {
        record
            .expression
            .as_ref()
            .filter(|e| !e.is_empty())
            .map(|text| PendingLink::Expression {
                dv,
                binding: crate::expression::ExpressionBinding::new(
                    text.clone(),
                    record.expr_language.unwrap_or_default(),
                    record.expr_has_ret,
                ),
            })
    };

    Ok(ChannelLoad {
        dv,
        enabled: record.enabled,
        state: ChannelState {
            value,
            curve,
            strings,
        },
        default,
        pending,
    })
}

impl Document {
    /// Snapshot of a knob: descriptive state plus every (dimension, view) channel.
    pub fn to_serialization(&self, k: KnobHandle) -> SerResult<KnobRecord> {
        let knob = self.knob(k)?;
        let meta = read(&knob.meta).clone();
        let mut values = Vec::new();
        for dv in knob.channels() {
            let (state, default) = {
                let store = read(&knob.store);
                (store.channel(dv), store.default_value(dv))
            };
            let (binding, pending) = {
                let links = lock(&knob.links);
                let binding = links.bindings.get(&dv).cloned().unwrap_or_default();
                let pending: Vec<PendingLink> = links
                    .pending
                    .iter()
                    .filter(|p| p.channel() == dv)
                    .cloned()
                    .collect();
                (binding, pending)
            };
            let json = |v: &TypedValue| {
                value_to_json(v).map_err(|e| SerializationError::malformed(&knob.name, e.to_string()))
            };
            let mut record = ValueRecord {
                dim: dv.dim,
                view: dv.view.0,
                enabled: meta.enabled.get(dv.dim as usize).copied().unwrap_or(true),
                has_animation: state.curve.is_some() || state.strings.is_some(),
                curve: state.curve,
                strings_animation: state.strings.map(|s| s.keys().to_vec()),
                value: json(&state.value)?,
                default: Some(json(&default)?),
                has_master: false,
                master: None,
                expression: None,
                expr_language: None,
                expr_has_ret: false,
            };
            match binding {
                Binding::Slaved(m) => {
                    let master = self.knob(m.knob)?;
                    record.has_master = true;
                    record.master = Some(MasterRecord {
                        master_dimension: m.dim,
                        master_node_name: self.holder(master.holder)?.name.clone(),
                        master_knob_name: master.name.clone(),
                        master_view: m.view.0,
                    });
                }
                Binding::Expression(e) => {
                    record.expression = Some(e.source_text);
                    record.expr_language = Some(e.language);
                    record.expr_has_ret = e.has_return_var;
                }
                Binding::Unbound => {}
            }
            // links that never resolved survive a save
            for p in pending {
                match p {
                    PendingLink::Master {
                        node,
                        knob: name,
                        master_dim,
                        master_view,
                        ..
                    } if !record.has_master => {
                        record.has_master = true;
                        record.master = Some(MasterRecord {
                            master_dimension: master_dim,
                            master_node_name: node,
                            master_knob_name: name,
                            master_view: master_view.0,
                        });
                    }
                    PendingLink::Expression { binding, .. } if record.expression.is_none() => {
                        record.expression = Some(binding.source_text);
                        record.expr_language = Some(binding.language);
                        record.expr_has_ret = binding.has_return_var;
                    }
                    _ => {}
                }
            }
            values.push(record);
        }

        let mut extra = meta.extra;
        if let KnobExtra::Choice {
            entries,
            choice_label,
            ..
        } = &mut extra
        {
            let index = read(&knob.store).value(DimView::main(0)).as_i64();
            *choice_label = index
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| entries.get(i).cloned());
        }

        Ok(KnobRecord {
            name: knob.name.clone(),
            kind: knob.kind.type_name().to_string(),
            dimension: knob.dimensions,
            secret: meta.secret,
            label: meta.label,
            hint: meta.hint,
            user_knob: meta.user_created,
            persistent: meta.persistent,
            animation_enabled: meta.animation_enabled,
            extra,
            values,
        })
    }

    /// Load a record into a live knob. The holder counts as loading a project for the
    /// duration: no auto-keying, and observers see `ProjectLoading`.
    ///
    /// Links and expressions are kept pending until `restore_links`.
    pub fn from_serialization(&self, record: &KnobRecord, k: KnobHandle) -> SerResult<()> {
        let knob = self.knob(k)?;
        let entry = self.holder(knob.holder)?;
        let was_loading = entry.loading.swap(true, Ordering::SeqCst);
        let result = self.load_record(&knob, k, record, ValueChangedReason::ProjectLoading);
        entry.loading.store(was_loading, Ordering::SeqCst);
        result
    }

    pub(crate) fn load_record(
        &self,
        knob: &Knob,
        k: KnobHandle,
        record: &KnobRecord,
        reason: ValueChangedReason,
    ) -> SerResult<()> {
        if KnobKind::from_type_name(&record.kind) != Some(knob.kind) {
            return Err(SerializationError::TypeMismatch {
                knob: knob.name.clone(),
                live: knob.kind.type_name().to_string(),
                recorded: record.kind.clone(),
            });
        }
        if record.dimension == 0 {
            return Err(SerializationError::malformed(&knob.name, "Dimension is 0"));
        }

        // Validate everything before touching the knob. Live dimensions past the
        // recorded ones take the last recorded dimension.
        let last = record.dimension - 1;
        let mut loads = Vec::new();
        for dim in 0..knob.dimensions {
            let source = dim.min(last);
            for vr in record.values_of(source) {
                loads.push(parse_channel(knob, vr, DimView::new(dim, ViewId(vr.view)))?);
            }
        }

        for view in loads.iter().map(|l| l.dv.view) {
            if view != ViewId::MAIN {
                self.add_view(k, view)?;
            }
        }
        let live: Vec<DimView> = knob.channels();
        for dv in &live {
            self.install_binding(knob, k, *dv, Binding::Unbound);
        }
        lock(&knob.links).pending.clear();

        {
            let mut meta = write(&knob.meta);
            meta.secret = record.secret;
            meta.animation_enabled = record.animation_enabled && knob.kind.can_animate();
            meta.persistent = record.persistent;
            if meta.user_created || record.user_knob {
                meta.user_created = true;
                meta.label = record.label.clone();
                meta.hint = record.hint.clone();
            }
            let adopt = record.user_knob || meta.extra == KnobExtra::None;
            match (&mut meta.extra, &record.extra) {
                (
                    KnobExtra::Choice { entries, helps, .. },
                    KnobExtra::Choice {
                        entries: recorded_entries,
                        helps: recorded_helps,
                        ..
                    },
                ) => {
                    if record.user_knob || entries.is_empty() {
                        *entries = recorded_entries.clone();
                        *helps = recorded_helps.clone();
                    }
                }
                (live_extra, recorded) => {
                    if adopt && *recorded != KnobExtra::None {
                        *live_extra = recorded.clone();
                        if let KnobExtra::Choice { choice_label, .. } = live_extra {
                            *choice_label = None;
                        }
                    }
                }
            }
            for load in &loads {
                if let Some(enabled) = meta.enabled.get_mut(load.dv.dim as usize) {
                    *enabled = load.enabled;
                }
            }
        }

        let mut touched = Vec::new();
        let mut pending = Vec::new();
        {
            let mut store = write(&knob.store);
            for load in loads {
                if let Some(d) = load.default {
                    store.set_default(load.dv, d);
                }
                store.put_channel(load.dv, load.state);
                pending.extend(load.pending);
                touched.push(load.dv);
            }
        }
        lock(&knob.links).pending.extend(pending);

        self.resolve_choice_label(knob, record);

        let time = self.time_of(knob);
        for dv in touched {
            self.propagate(k, dv, reason, time, 0);
        }
        Ok(())
    }

    /// When the entry list changed since the record was written, select the recorded
    /// label again rather than the recorded index.
    fn resolve_choice_label(&self, knob: &Knob, record: &KnobRecord) {
        let KnobExtra::Choice {
            choice_label: Some(label),
            ..
        } = &record.extra
        else {
            return;
        };
        let entries = match &read(&knob.meta).extra {
            KnobExtra::Choice { entries, .. } => entries.clone(),
            _ => return,
        };
        let mut store = write(&knob.store);
        for view in knob.views() {
            let dv = DimView::new(0, view);
            let index = store.value(dv).as_i64();
            let current = index
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| entries.get(i));
            if current == Some(label) {
                continue;
            }
            match entries.iter().position(|e| e == label) {
                Some(i) => {
                    store.set_scalar(dv, TypedValue::Int(i as i64));
                }
                None => log::debug!(
                    "{}: choice '{label}' no longer exists, keeping index {index:?}",
                    knob.name
                ),
            }
        }
    }

    /// Resolve the links and expressions that `from_serialization` left pending on
    /// `knobs`. Masters are looked up by node name and knob name.
    ///
    /// Every resolvable link is committed; the first failure is returned and each one is
    /// reported on its holder. Unresolved masters stay pending.
    pub fn restore_links(&self, knobs: &[KnobHandle]) -> SerResult<()> {
        let mut first_error = None;
        for &k in knobs {
            let knob = match self.knob(k) {
                Ok(knob) => knob,
                Err(e) => {
                    first_error.get_or_insert(SerializationError::from(e));
                    continue;
                }
            };
            let pending = std::mem::take(&mut lock(&knob.links).pending);
            let mut unresolved = Vec::new();
            for link in pending {
                let outcome = match &link {
                    PendingLink::Expression { dv, binding } => self
                        .set_expression(
                            k,
                            dv.dim,
                            dv.view,
                            &binding.source_text,
                            binding.language,
                            binding.has_return_var,
                            false,
                        )
                        .map_err(|e| SerializationError::from(KnobError::from(e))),
                    PendingLink::Master {
                        dv,
                        node,
                        knob: name,
                        master_dim,
                        master_view,
                    } => match self.find_holder(node).and_then(|h| self.find_knob(h, name)) {
                        Some(master) => self
                            .link_to(k, dv.dim, dv.view, master, *master_dim, *master_view)
                            .map_err(|e| SerializationError::from(KnobError::from(e))),
                        None => {
                            unresolved.push(link.clone());
                            Err(SerializationError::DanglingMaster {
                                knob: knob.name.clone(),
                                node: node.clone(),
                                master: name.clone(),
                            })
                        }
                    },
                };
                if let Err(e) = outcome {
                    self.report_persistent_message(knob.holder, format!("{}: {e}", knob.name));
                    first_error.get_or_insert(e);
                }
            }
            lock(&knob.links).pending.extend(unresolved);
        }
        first_error.map_or(Ok(()), Err)
    }
}
