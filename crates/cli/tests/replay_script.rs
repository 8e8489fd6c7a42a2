use backoffice_cli::{Script, replay};
use backoffice_core::Money;
use serde_json::json;

fn script(value: serde_json::Value) -> Script {
    serde_json::from_value(value).expect("script should deserialize")
}

#[test]
fn replays_a_full_editing_session() {
    let report = replay(script(json!({
        "products": [
            { "product_id": 7, "purchase_price": 10000, "category": "dairy" },
            { "product_id": 8, "purchase_price": 20000 }
        ],
        "actions": [
            { "action": "header_changed", "header": { "field": "invoice_number", "value": "PI-2026-0001" } },
            { "action": "header_changed", "header": { "field": "supplier", "value": 3 } },
            { "action": "header_changed", "header": { "field": "date", "value": "2026-10-18" } },
            { "action": "product_selected", "index": 0, "product_id": 7 },
            { "action": "item_added" },
            { "action": "product_selected", "index": 1, "product_id": 8 },
            { "action": "global_paid_changed", "amount": 9000 },
            { "action": "item_paid_changed", "index": 0, "amount": 1000 }
        ]
    })));

    assert_eq!(report.steps.len(), 8);
    assert!(report.steps.iter().all(|s| s.error.is_none()));

    let after_global = &report.steps[6].totals;
    assert_eq!(after_global.total_amount, Money::from_major(300));
    assert_eq!(after_global.amount_paid, Money::from_major(90));

    let items = &report.draft.items;
    assert_eq!(items[0].amount_paid(), Money::from_major(10));
    assert_eq!(items[1].amount_paid(), Money::from_major(80));
    assert_eq!(report.draft.amount_paid, Money::from_major(90));

    assert!(report.valid, "validation: {}", report.validation);
}

#[test]
fn rejected_actions_are_reported_and_skipped() {
    let report = replay(script(json!({
        "actions": [
            { "action": "item_removed", "index": 0 },
            { "action": "item_paid_changed", "index": 5, "amount": 100 },
            { "action": "item_field_changed", "index": 0, "field": "unit_price", "raw": "12.5" }
        ]
    })));

    assert!(report.steps[0].error.as_deref().unwrap().contains("at least one line"));
    assert!(report.steps[1].error.as_deref().unwrap().contains("out of range"));
    assert_eq!(report.steps[2].totals.total_amount, Money::from_cents(1250));
    assert_eq!(report.draft.items.len(), 1);
    assert!(!report.valid);
    assert!(report.validation.get("items[0].product_id").is_some());
}

#[test]
fn conflicts_are_rendered_as_messages() {
    let report = replay(script(json!({
        "draft": {
            "items": [
                { "product_id": 1, "quantity": 1, "unit_price": 10000, "number_of_units": 1 },
                { "product_id": 2, "quantity": 1, "unit_price": 10000, "number_of_units": 1 }
            ]
        },
        "actions": [
            { "action": "global_paid_changed", "amount": 4000 },
            { "action": "item_paid_changed", "index": 1, "amount": 7000 }
        ]
    })));

    assert_eq!(report.steps[0].conflict, None);
    assert_eq!(
        report.steps[1].conflict.as_deref(),
        Some("line 2 payment 70.00 exceeds the invoice paid amount; reduced to 40.00")
    );

    let rendered = serde_json::to_value(&report).unwrap();
    assert_eq!(rendered["draft"]["amount_paid"], 4000);
    assert_eq!(rendered["draft"]["items"][1]["total_price"], 10000);
}
