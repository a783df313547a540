//! Unit tests for template module

#[cfg(test)]
mod tests {
    use crate::network::IpConfig;
    use crate::template::*;
    use serde_json::json;

    fn render(text: &str, data: &serde_json::Value) -> Result<String, TemplateError> {
        Template::parse("test", text)?.execute(data)
    }

    fn template_data() -> serde_json::Value {
        serde_json::to_value(TemplateData {
            network_interfaces: vec![
                IpConfig {
                    ip: "192.168.1.10".to_string(),
                    ip_family: "IPv4".to_string(),
                    gateway: "192.168.1.1".to_string(),
                    subnet_mask: "255.255.255.0".to_string(),
                },
                IpConfig {
                    ip: "10.0.0.5".to_string(),
                    ip_family: "IPv4".to_string(),
                    gateway: "10.0.0.1".to_string(),
                    subnet_mask: "255.0.0.0".to_string(),
                },
            ],
            name_servers: vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],
        })
        .unwrap()
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        assert_eq!(render("hello world", &json!({})).unwrap(), "hello world");
        assert_eq!(render("", &json!({})).unwrap(), "");
    }

    #[test]
    fn test_index_and_field() {
        let data = template_data();
        assert_eq!(
            render("gw={{ (index .NetworkInterfaces 0).Gateway }}", &data).unwrap(),
            "gw=192.168.1.1"
        );
        assert_eq!(render("{{ (index .NetworkInterfaces 1).IP }}", &data).unwrap(), "10.0.0.5");
        assert_eq!(render("{{ index .NameServers 1 }}", &data).unwrap(), "1.1.1.1");
        assert_eq!(render("{{ .NameServers }}", &data).unwrap(), "[8.8.8.8 1.1.1.1]");
    }

    #[test]
    fn test_field_falls_back_to_lower_camel_case() {
        let data = json!({ "imageName": "ubuntu-22.04", "advancedOptions": { "changeBlockTracking": true } });
        assert_eq!(render("{{ .ImageName }}", &data).unwrap(), "ubuntu-22.04");
        assert_eq!(render("{{.AdvancedOptions.ChangeBlockTracking}}", &data).unwrap(), "true");
    }

    #[test]
    fn test_dot_trim_and_comments() {
        assert_eq!(render("{{ . }}", &json!("x")).unwrap(), "x");
        assert_eq!(render("a  {{- .A -}}  b", &json!({ "A": 1 })).unwrap(), "a1b");
        assert_eq!(render("a{{/* note */}}b", &json!({})).unwrap(), "ab");
        assert_eq!(render(r#"{{ index .M "k" }}"#, &json!({ "M": { "k": "v" } })).unwrap(), "v");
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["{{ .A", "{{ }}", "{{ printf .A }}", "{{ .A .B }}", "{{ (index .A 0 }}", "{{ $x }}"] {
            assert!(
                matches!(Template::parse("t", bad), Err(TemplateError::Parse { .. })),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn test_execute_errors() {
        let data = template_data();
        for bad in [
            "{{ (index .NetworkInterfaces 5).IP }}",
            "{{ .Missing }}",
            "{{ .NameServers.First }}",
            "{{ index .Nothing 0 }}",
        ] {
            assert!(
                matches!(render(bad, &data), Err(TemplateError::Execute { .. })),
                "{bad} should fail to execute"
            );
        }
    }

    #[test]
    fn test_render_or_literal_keeps_text_on_failure() {
        let data = template_data();
        assert_eq!(render_or_literal("k", "{{ .Missing }}", &data), "{{ .Missing }}");
        assert_eq!(render_or_literal("k", "{{ .A", &data), "{{ .A");
        assert_eq!(render_or_literal("k", "{{ index .NameServers 0 }}", &data), "8.8.8.8");
    }
}
