//! Pluggable identifier-casing strategies used when the receiver translates a
//! wire-declared method name into the host implementation's method name.

/// Translates schema-declared identifiers into host-language identifiers.
pub trait NameConverter: Send + Sync {
    fn interface_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn method_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn parameter_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn enum_value_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn record_field_name(&self, name: &str) -> String {
        name.to_string()
    }
}

/// No conversion: wire names are used verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityNameConverter;

impl NameConverter for IdentityNameConverter {}

/// CamelCase-to-snake_case for methods, parameters and record fields; enum values
/// become UPPER_SNAKE_CASE.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnakeCaseNameConverter;

impl SnakeCaseNameConverter {
    fn to_snake_case(name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 4);
        for (idx, ch) in name.chars().enumerate() {
            if ch.is_uppercase() && idx > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        }
        out
    }
}

impl NameConverter for SnakeCaseNameConverter {
    fn method_name(&self, name: &str) -> String {
        Self::to_snake_case(name)
    }

    fn parameter_name(&self, name: &str) -> String {
        self.method_name(name)
    }

    fn record_field_name(&self, name: &str) -> String {
        self.method_name(name)
    }

    fn enum_value_name(&self, name: &str) -> String {
        self.method_name(name).to_uppercase()
    }
}

/// C#-style naming: interfaces are prefixed with `I`; parameter names have their
/// first character lowercased.
#[derive(Debug, Default, Clone, Copy)]
pub struct CSharpNameConverter;

impl NameConverter for CSharpNameConverter {
    fn interface_name(&self, name: &str) -> String {
        format!("I{name}")
    }

    fn parameter_name(&self, name: &str) -> String {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_a_no_op() {
        let conv = IdentityNameConverter;
        assert_eq!(conv.method_name("GetAge"), "GetAge");
        assert_eq!(conv.enum_value_name("Activated"), "Activated");
    }

    #[test]
    fn snake_case_converts_methods_and_upper_snakes_enum_values() {
        let conv = SnakeCaseNameConverter;
        assert_eq!(conv.method_name("GetAge"), "get_age");
        assert_eq!(conv.method_name("AddFriend"), "add_friend");
        assert_eq!(conv.enum_value_name("Activated"), "ACTIVATED");
        assert_eq!(conv.parameter_name("degree"), "degree");
    }

    #[test]
    fn csharp_prefixes_interfaces_and_lowercases_first_param_char() {
        let conv = CSharpNameConverter;
        assert_eq!(conv.interface_name("User"), "IUser");
        assert_eq!(conv.parameter_name("Degree"), "degree");
        assert_eq!(conv.method_name("GetAge"), "GetAge");
    }
}
