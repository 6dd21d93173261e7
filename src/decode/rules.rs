//! The ordered rules which name decoded columns.
//!
//! Each rule looks at the labels at both ends of an edge (the target is absent for variables of a
//! single node) and the variable kind. The first rule returning a name wins.
use crate::catalog::{UnitCategory, UnitKey};
use crate::solver::VariableKind;
use crate::topology::NodeLabel;

/// A named decoding rule
pub struct Rule {
    /// Used in log messages
    pub name: &'static str,
    /// Returns the column name if the rule applies
    pub apply: fn(NodeLabel, Option<NodeLabel>, VariableKind) -> Option<String>,
}

/// All rules, in the order they are tried
pub const RULES: &[Rule] = &[
    Rule {
        name: "heat pump output",
        apply: heat_pump_output,
    },
    Rule {
        name: "storage discharge",
        apply: storage_output,
    },
    Rule {
        name: "storage charge",
        apply: storage_input,
    },
    Rule {
        name: "unit heat output",
        apply: unit_heat_output,
    },
    Rule {
        name: "heat demand",
        apply: heat_demand,
    },
    Rule {
        name: "CHP electricity",
        apply: chp_electricity,
    },
    Rule {
        name: "electricity input",
        apply: electricity_input,
    },
    Rule {
        name: "gas input",
        apply: gas_input,
    },
    Rule {
        name: "CHP node output",
        apply: chp_node_output,
    },
    Rule {
        name: "internal electricity",
        apply: internal_router,
    },
    Rule {
        name: "procurement",
        apply: procurement,
    },
    Rule {
        name: "storage node",
        apply: storage_node,
    },
];

/// The name of the column for a result and the rule which produced it
pub fn column_name(
    source: NodeLabel,
    target: Option<NodeLabel>,
    kind: VariableKind,
) -> Option<(&'static str, String)> {
    RULES
        .iter()
        .find_map(|rule| Some((rule.name, (rule.apply)(source, target, kind)?)))
}

/// The unit key if the label belongs to a unit of the given category
fn unit_of(label: NodeLabel, category: UnitCategory) -> Option<UnitKey> {
    label.unit().filter(|key| key.category == category)
}

fn heat_pump_output(
    source: NodeLabel,
    target: Option<NodeLabel>,
    kind: VariableKind,
) -> Option<String> {
    let unit = unit_of(source, UnitCategory::HeatPump)?;
    if target != Some(NodeLabel::HeatBus) {
        return None;
    }
    match kind {
        VariableKind::Flow => Some(format!("Q_out_{unit}")),
        VariableKind::Invest => Some(format!("cap_{unit}")),
        VariableKind::Status => Some(format!("state_{unit}")),
        VariableKind::StatusNominal => Some(format!("state_nom_{unit}")),
        _ => None,
    }
}

fn storage_output(
    source: NodeLabel,
    target: Option<NodeLabel>,
    kind: VariableKind,
) -> Option<String> {
    let unit = unit_of(source, UnitCategory::ThermalStorage)?;
    if target != Some(NodeLabel::HeatBus) {
        return None;
    }
    match kind {
        VariableKind::Flow => Some(format!("Q_out_{unit}")),
        VariableKind::Invest => Some(format!("cap_out_{unit}")),
        VariableKind::Total => Some(format!("total_out_{unit}")),
        _ => None,
    }
}

fn storage_input(
    source: NodeLabel,
    target: Option<NodeLabel>,
    kind: VariableKind,
) -> Option<String> {
    if source != NodeLabel::HeatBus {
        return None;
    }
    let unit = unit_of(target?, UnitCategory::ThermalStorage)?;
    match kind {
        VariableKind::Flow => Some(format!("Q_in_{unit}")),
        VariableKind::Invest => Some(format!("cap_in_{unit}")),
        VariableKind::Total => Some(format!("total_in_{unit}")),
        _ => None,
    }
}

fn unit_heat_output(
    source: NodeLabel,
    target: Option<NodeLabel>,
    kind: VariableKind,
) -> Option<String> {
    let unit = source.unit()?;
    if target != Some(NodeLabel::HeatBus) {
        return None;
    }
    match kind {
        VariableKind::Flow => Some(format!("Q_{unit}")),
        VariableKind::Invest => Some(format!("cap_{unit}")),
        VariableKind::Status => Some(format!("state_{unit}")),
        VariableKind::StatusNominal => Some(format!("state_nom_{unit}")),
        VariableKind::Total => Some(format!("total_{unit}")),
        VariableKind::StorageContent => None,
    }
}

fn heat_demand(source: NodeLabel, target: Option<NodeLabel>, kind: VariableKind) -> Option<String> {
    (source == NodeLabel::HeatBus
        && target == Some(NodeLabel::HeatDemand)
        && kind == VariableKind::Flow)
        .then(|| "Q_demand".to_string())
}

fn chp_electricity(
    source: NodeLabel,
    target: Option<NodeLabel>,
    kind: VariableKind,
) -> Option<String> {
    let unit = source.unit()?;
    (target == Some(NodeLabel::ChpNode) && kind == VariableKind::Flow)
        .then(|| format!("P_{unit}"))
}

fn electricity_input(
    source: NodeLabel,
    target: Option<NodeLabel>,
    kind: VariableKind,
) -> Option<String> {
    if source != NodeLabel::ElectricityBus || kind != VariableKind::Flow {
        return None;
    }
    let unit = target?.unit()?;
    if unit.category == UnitCategory::HeatPump {
        Some(format!("P_in_{unit}"))
    } else {
        Some(format!("P_{unit}"))
    }
}

fn gas_input(source: NodeLabel, target: Option<NodeLabel>, kind: VariableKind) -> Option<String> {
    if source != NodeLabel::GasBus || kind != VariableKind::Flow {
        return None;
    }
    let unit = target?.unit()?;
    Some(format!("H_{unit}"))
}

fn chp_node_output(
    source: NodeLabel,
    target: Option<NodeLabel>,
    kind: VariableKind,
) -> Option<String> {
    if source != NodeLabel::ChpNode || kind != VariableKind::Flow {
        return None;
    }
    match target? {
        NodeLabel::Spotmarket => Some("P_spotmarket".to_string()),
        NodeLabel::InternalRouter => Some("P_internal".to_string()),
        _ => None,
    }
}

fn internal_router(
    source: NodeLabel,
    target: Option<NodeLabel>,
    kind: VariableKind,
) -> Option<String> {
    (source == NodeLabel::InternalRouter
        && target == Some(NodeLabel::ElectricityBus)
        && kind == VariableKind::Flow)
        .then(|| "P_internal".to_string())
}

fn procurement(source: NodeLabel, target: Option<NodeLabel>, kind: VariableKind) -> Option<String> {
    if kind != VariableKind::Flow {
        return None;
    }
    match (source, target?) {
        (NodeLabel::GasSource, NodeLabel::GasBus) => Some("H_source".to_string()),
        (NodeLabel::ElectricitySource, NodeLabel::ElectricityBus) => Some("P_source".to_string()),
        _ => None,
    }
}

fn storage_node(source: NodeLabel, target: Option<NodeLabel>, kind: VariableKind) -> Option<String> {
    let unit = unit_of(source, UnitCategory::ThermalStorage)?;
    if target.is_some() {
        return None;
    }
    match kind {
        VariableKind::StorageContent => Some(format!("storage_content_{unit}")),
        VariableKind::Invest => Some(format!("cap_{unit}")),
        _ => None,
    }
}
