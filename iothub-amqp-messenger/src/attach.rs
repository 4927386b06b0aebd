//! Translation of user attach properties into AMQP link properties

use fe2o3_amqp_types::definitions::Fields;
use serde_amqp::primitives::{OrderedMap, Symbol};
use serde_amqp::Value;

/// Turns a caller-supplied string map into the symbol-keyed `Fields` map
/// applied at link attach time. Insertion order is preserved.
pub(crate) fn link_attach_properties(user_properties: &OrderedMap<String, String>) -> Fields {
    let mut fields = Fields::default();
    for (key, value) in user_properties.as_inner().iter() {
        fields.insert(Symbol::from(key.clone()), Value::String(value.clone()));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_become_symbols_and_values_strings() {
        let mut user = OrderedMap::default();
        user.insert("com.microsoft:api-version".to_owned(), "1.0".to_owned());
        user.insert("com.microsoft:client-version".to_owned(), "test".to_owned());

        let fields = link_attach_properties(&user);

        assert_eq!(
            fields.get(&Symbol::from("com.microsoft:api-version")),
            Some(&Value::String("1.0".to_owned()))
        );
        assert_eq!(
            fields.get(&Symbol::from("com.microsoft:client-version")),
            Some(&Value::String("test".to_owned()))
        );
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut user = OrderedMap::default();
        user.insert("b".to_owned(), "2".to_owned());
        user.insert("a".to_owned(), "1".to_owned());

        let fields = link_attach_properties(&user);
        let keys: Vec<_> = fields.as_inner().keys().cloned().collect();
        assert_eq!(keys, vec![Symbol::from("b"), Symbol::from("a")]);
    }
}
