//! Conversions between property maps and wire values.

use std::collections::BTreeMap;

use evlog_protocol::{InterfaceMap, PropertyMap, Value};
use evlog_types::ObjectPath;

use crate::error::{BusError, BusResult};

pub fn property_map_to_value(properties: PropertyMap) -> Value {
    Value::Dict(properties)
}

pub fn interface_map_to_value(interfaces: InterfaceMap) -> Value {
    Value::Dict(
        interfaces
            .into_iter()
            .map(|(name, properties)| (name, Value::Dict(properties)))
            .collect(),
    )
}

pub fn value_to_property_map(value: Value) -> BusResult<PropertyMap> {
    match value {
        Value::Dict(map) => Ok(map),
        other => Err(BusError::UnexpectedReply(format!(
            "expected a{{sv}}, got {}",
            other.signature()
        ))),
    }
}

pub fn value_to_interface_map(value: Value) -> BusResult<InterfaceMap> {
    value_to_property_map(value)?
        .into_iter()
        .map(|(name, properties)| Ok((name, value_to_property_map(properties)?)))
        .collect()
}

/// Encode a `GetManagedObjects` reply: object path to its interfaces.
pub fn managed_objects_to_value(objects: BTreeMap<ObjectPath, InterfaceMap>) -> Value {
    Value::Dict(
        objects
            .into_iter()
            .map(|(path, interfaces)| (path.to_string(), interface_map_to_value(interfaces)))
            .collect(),
    )
}

pub fn value_to_managed_objects(value: Value) -> BusResult<BTreeMap<ObjectPath, InterfaceMap>> {
    value_to_property_map(value)?
        .into_iter()
        .map(|(path, interfaces)| {
            let path = ObjectPath::new(&path)?;
            Ok((path, value_to_interface_map(interfaces)?))
        })
        .collect()
}

/// Take the single value out of a reply.
pub fn single(mut values: Vec<Value>) -> BusResult<Value> {
    if values.len() != 1 {
        return Err(BusError::UnexpectedReply(format!(
            "expected one value, got {}",
            values.len()
        )));
    }
    Ok(values.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_objects_survive_encoding() {
        let mut props = PropertyMap::new();
        props.insert("message".into(), "hi".into());
        let mut ifaces = InterfaceMap::new();
        ifaces.insert("x.Item".into(), props);
        let mut objects = BTreeMap::new();
        objects.insert(ObjectPath::new("/r/1").unwrap(), ifaces);

        let decoded = value_to_managed_objects(managed_objects_to_value(objects.clone())).unwrap();
        assert_eq!(decoded, objects);
    }

    #[test]
    fn wrong_shape_is_unexpected_reply() {
        let err = value_to_property_map(Value::U16(0)).unwrap_err();
        assert!(matches!(err, BusError::UnexpectedReply(_)));

        let mut bad = BTreeMap::new();
        bad.insert("not a path".to_string(), Value::Dict(BTreeMap::new()));
        let err = value_to_managed_objects(Value::Dict(bad)).unwrap_err();
        assert!(matches!(err, BusError::InvalidName(_)));
    }

    #[test]
    fn single_requires_exactly_one() {
        assert_eq!(single(vec![Value::U16(3)]).unwrap(), Value::U16(3));
        assert!(single(vec![]).is_err());
        assert!(single(vec![Value::U16(1), Value::U16(2)]).is_err());
    }
}
