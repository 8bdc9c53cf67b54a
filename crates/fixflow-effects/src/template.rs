//! # Message Templates
//!
//! Variable resolution for trigger templates, placeholder rendering, and the
//! fixed notices sent on intake, handover and completion.

use fixflow_gateway::{Customer, EmailMessage, Template, TemplateVariables};
use fixflow_state::Device;

/// Subject of the staff email sent when a device is ready for handover.
pub const HANDOVER_SUBJECT: &str = "Device Ready for Handover";

/// Subject of the customer email sent when a device is done.
pub const PICKUP_SUBJECT: &str = "Your Device is Ready for Pickup";

/// Resolve every variable the template declares.
///
/// Device fields win over customer fields. Returns the names that resolved
/// on neither side as the error.
pub fn resolve_variables(
    template: &Template,
    device: &Device,
    customer: &Customer,
) -> Result<TemplateVariables, Vec<String>> {
    let mut resolved = TemplateVariables::new();
    let mut missing = Vec::new();
    for name in &template.variables {
        match device.field(name).or_else(|| customer.field(name)) {
            Some(value) => {
                resolved.insert(name.clone(), value);
            }
            None => missing.push(name.clone()),
        }
    }
    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(missing)
    }
}

/// Replace `{name}` placeholders. Unknown placeholders are left as written.
pub fn render(content: &str, variables: &TemplateVariables) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

const INTAKE_TEXT: &str =
    "Hello {name}, we have received your {brand} {model} for {issue}. Reference: {reference}.";

const READY_TEXT: &str =
    "Hello {name}, your {brand} {model} is ready for pickup. Reference: {reference}.";

const HANDOVER_TEXT: &str = "Device {brand} {model} (SN: {serial}) is ready for customer handover.";

const PICKUP_TEXT: &str =
    "Dear {name},\n\nYour device ({brand} {model}, SN: {serial}) is ready for pickup.\n\nThank you.";

/// Placeholder values shared by the fixed notices.
fn notice_variables(device: &Device, customer: Option<&Customer>) -> TemplateVariables {
    let name = match customer {
        Some(c) if !c.name.trim().is_empty() => c.name.trim(),
        _ => "Customer",
    };
    let issue = match device.issue_description.trim() {
        "" => "repair",
        issue => issue,
    };
    TemplateVariables::from([
        ("name".to_string(), name.to_string()),
        ("brand".to_string(), device.brand.clone()),
        ("model".to_string(), device.model.clone()),
        ("serial".to_string(), device.serial_number.clone()),
        ("issue".to_string(), issue.to_string()),
        ("reference".to_string(), device.id.as_uuid().to_string()),
    ])
}

/// SMS confirming a device was received.
pub fn intake_sms(customer: &Customer, device: &Device) -> String {
    render(INTAKE_TEXT, &notice_variables(device, Some(customer)))
}

/// SMS telling the customer the device can be collected.
pub fn ready_sms(customer: &Customer, device: &Device) -> String {
    render(READY_TEXT, &notice_variables(device, Some(customer)))
}

/// Staff email announcing a device ready for handover.
pub fn handover_email(recipients: Vec<String>, device: &Device) -> EmailMessage {
    EmailMessage {
        to: recipients,
        subject: HANDOVER_SUBJECT.to_string(),
        body: render(HANDOVER_TEXT, &notice_variables(device, None)),
    }
}

/// Customer email announcing the device can be collected.
pub fn pickup_email(email: &str, customer: &Customer, device: &Device) -> EmailMessage {
    EmailMessage {
        to: vec![email.to_string()],
        subject: PICKUP_SUBJECT.to_string(),
        body: render(PICKUP_TEXT, &notice_variables(device, Some(customer))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fixflow_core::{Actor, ActorRole, CustomerId, TemplateId, UserId};
    use fixflow_state::NewDevice;

    fn fixtures() -> (Device, Customer) {
        let customer = Customer {
            id: CustomerId::new(),
            name: "Baraka".into(),
            phone: Some("+255711000000".into()),
            email: None,
            customer_tag: None,
            loyalty_level: "silver".into(),
            points: 0,
        };
        let device = Device::intake(
            NewDevice {
                customer_id: customer.id,
                brand: "Samsung".into(),
                model: "A14".into(),
                serial_number: "R58".into(),
                issue_description: "charging port".into(),
                expected_return_date: None,
                assigned_to: None,
            },
            &Actor::new(UserId::new(), ActorRole::CustomerCare),
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        );
        (device, customer)
    }

    fn template(vars: &[&str]) -> Template {
        Template {
            id: TemplateId::new(),
            name: "t".into(),
            content: String::new(),
            variables: vars.iter().map(|v| v.to_string()).collect(),
            is_active: true,
        }
    }

    #[test]
    fn device_fields_take_precedence() {
        let (device, customer) = fixtures();
        let vars = resolve_variables(&template(&["brand", "name", "serialNumber"]), &device, &customer)
            .unwrap();
        assert_eq!(vars["brand"], "Samsung");
        assert_eq!(vars["name"], "Baraka");
        assert_eq!(vars["serialNumber"], "R58");
    }

    #[test]
    fn missing_variables_are_all_reported() {
        let (device, customer) = fixtures();
        let missing =
            resolve_variables(&template(&["brand", "email", "pickup_code"]), &device, &customer)
                .unwrap_err();
        assert_eq!(missing, vec!["email".to_string(), "pickup_code".to_string()]);
    }

    #[test]
    fn render_substitutes_known_placeholders() {
        let mut vars = TemplateVariables::new();
        vars.insert("name".into(), "Baraka".into());
        assert_eq!(render("Hi {name}, {unknown} {", &vars), "Hi Baraka, {unknown} {");
    }

    #[test]
    fn fixed_notices_name_the_device() {
        let (device, customer) = fixtures();
        let mail = handover_email(vec!["cc@shop.example".into()], &device);
        assert_eq!(mail.subject, HANDOVER_SUBJECT);
        assert!(mail.body.contains("Samsung A14 (SN: R58)"));
        assert!(intake_sms(&customer, &device).contains("charging port"));
        assert!(ready_sms(&customer, &device).starts_with("Hello Baraka"));
        let pickup = pickup_email("b@example.com", &customer, &device);
        assert_eq!(pickup.to, vec!["b@example.com".to_string()]);
        assert!(pickup.body.starts_with("Dear Baraka,\n\n"));
    }

    #[test]
    fn notice_values_are_not_expanded_again() {
        let (mut device, mut customer) = fixtures();
        device.brand = "{model}".into();
        device.issue_description = "  ".into();
        customer.name = " ".into();
        assert_eq!(
            intake_sms(&customer, &device),
            format!(
                "Hello Customer, we have received your {{model}} A14 for repair. Reference: {}.",
                device.id.as_uuid()
            )
        );
    }
}
