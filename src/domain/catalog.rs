// ==========================================
// 薪酬批量导入管道 - 内置导入 Schema
// ==========================================
// 覆盖: 员工 / 员工标识（含工会解析）/ 薪资代码 / 打卡记录
// 阈值: 从 ImportConfig 注入，Schema 本身不读配置
// ==========================================

use crate::config::ImportConfig;
use crate::domain::schema::{FieldSchema, ImportSchema, ValidationRule};
use crate::domain::types::{FieldFormat, Severity};

pub const EMPLOYEE: &str = "employee";
pub const EMPLOYEE_IDENTIFIER: &str = "employee_identifier";
pub const PAY_CODE: &str = "pay_code";
pub const TIME_PUNCH: &str = "time_punch";

/// 工会参照表名
pub const UNION_LOOKUP: &str = "union";

/// 所有内置实体名
pub fn builtin_entities() -> [&'static str; 4] {
    [EMPLOYEE, EMPLOYEE_IDENTIFIER, PAY_CODE, TIME_PUNCH]
}

/// 按实体名取内置 Schema
pub fn builtin_schema(entity: &str, config: &ImportConfig) -> Option<ImportSchema> {
    match entity {
        EMPLOYEE => Some(employee_schema(config)),
        EMPLOYEE_IDENTIFIER => Some(employee_identifier_schema()),
        PAY_CODE => Some(pay_code_schema()),
        TIME_PUNCH => Some(time_punch_schema()),
        _ => None,
    }
}

// ==========================================
// 员工
// ==========================================
pub fn employee_schema(config: &ImportConfig) -> ImportSchema {
    let checksum_severity = if config.sin_checksum_blocking {
        Severity::Error
    } else {
        Severity::Warning
    };

    ImportSchema {
        entity: EMPLOYEE.to_string(),
        fields: vec![
            FieldSchema::new("employee_number", "Employee Number", FieldFormat::Code)
                .required()
                .aliases(&[
                    "Employee ID",
                    "Emp ID",
                    "Emp No",
                    "Employee No",
                    "Staff ID",
                    "Badge ID",
                ]),
            FieldSchema::new("employee_name", "Employee Name", FieldFormat::PersonName)
                .required()
                .aliases(&["Name", "Full Name", "Employee", "Last, First"]),
            FieldSchema::new("sin", "SIN", FieldFormat::NationalId).aliases(&[
                "Social Insurance Number",
                "SIN Number",
                "SIN #",
                "NAS",
            ]),
            FieldSchema::new("birth_date", "Birth Date", FieldFormat::Date).aliases(&[
                "Date of Birth",
                "DOB",
                "Birthdate",
            ]),
            FieldSchema::new("hire_date", "Hire Date", FieldFormat::Date)
                .required()
                .aliases(&["Start Date", "Date Hired", "Original Hire Date", "Hired"]),
            FieldSchema::new("termination_date", "Termination Date", FieldFormat::Date)
                .aliases(&["End Date", "Term Date", "Date Terminated"]),
            FieldSchema::new("province", "Province", FieldFormat::Region)
                .required()
                .aliases(&[
                    "Prov",
                    "Province of Employment",
                    "Work Province",
                    "Region",
                    "Province/Territory",
                ]),
            FieldSchema::new("postal_code", "Postal Code", FieldFormat::PostalCode)
                .aliases(&["Postal", "Zip", "Zip Code", "Postcode"]),
            FieldSchema::new("email", "Email", FieldFormat::Email).aliases(&[
                "E-mail",
                "Email Address",
                "Work Email",
            ]),
            FieldSchema::new("hourly_rate", "Hourly Rate", FieldFormat::Rate).aliases(&[
                "Rate",
                "Pay Rate",
                "Rate/Hr",
                "Wage",
            ]),
            FieldSchema::new("pay_frequency", "Pay Frequency", FieldFormat::Enum)
                .aliases(&["Pay Period", "Frequency", "Pay Schedule"])
                .options(&["weekly", "biweekly", "semimonthly", "monthly"]),
            FieldSchema::new("active", "Active", FieldFormat::Boolean).aliases(&[
                "Is Active",
                "Status Active",
                "Active?",
            ]),
        ],
        rules: vec![
            ValidationRule::Checksum {
                field: "sin".to_string(),
                severity: checksum_severity,
            },
            ValidationRule::Email {
                field: "email".to_string(),
            },
            ValidationRule::MinimumAge {
                birth_field: "birth_date".to_string(),
                years: config.minimum_employee_age_years,
            },
            ValidationRule::NotInFuture {
                field: "hire_date".to_string(),
                severity: Severity::Warning,
            },
            ValidationRule::DateOrder {
                start_field: "hire_date".to_string(),
                end_field: "termination_date".to_string(),
            },
            ValidationRule::Range {
                field: "hourly_rate".to_string(),
                min: Some(0.0),
                max: None,
                severity: Severity::Error,
            },
            ValidationRule::Range {
                field: "hourly_rate".to_string(),
                min: None,
                max: Some(config.hourly_rate_warning_threshold),
                severity: Severity::Warning,
            },
        ],
        business_key: vec!["employee_number".to_string()],
    }
}

// ==========================================
// 员工标识（工号/卡号/工会会员号等）
// ==========================================
pub fn employee_identifier_schema() -> ImportSchema {
    ImportSchema {
        entity: EMPLOYEE_IDENTIFIER.to_string(),
        fields: vec![
            FieldSchema::new("employee_number", "Employee Number", FieldFormat::Code)
                .required()
                .aliases(&["Employee ID", "Emp ID", "Emp No", "Employee No"]),
            FieldSchema::new("identifier_type", "Identifier Type", FieldFormat::Enum)
                .required()
                .aliases(&["ID Type", "Type"])
                .options(&["badge", "payroll_id", "union_member", "external"]),
            FieldSchema::new("identifier", "Identifier", FieldFormat::Code)
                .required()
                .aliases(&["Identifier Value", "ID Value", "Number", "ID"]),
            FieldSchema::new("source_system", "Source System", FieldFormat::Code)
                .aliases(&["Source", "System", "Provider"]),
            FieldSchema::new("union", "Union", FieldFormat::Lookup(UNION_LOOKUP.to_string()))
                .aliases(&["Union Name", "Union Code", "Local", "Bargaining Unit"]),
            FieldSchema::new("effective_date", "Effective Date", FieldFormat::Date)
                .aliases(&["Effective", "Start Date", "Valid From"]),
        ],
        rules: vec![],
        business_key: vec!["identifier".to_string(), "source_system".to_string()],
    }
}

// ==========================================
// 薪资代码
// ==========================================
pub fn pay_code_schema() -> ImportSchema {
    ImportSchema {
        entity: PAY_CODE.to_string(),
        fields: vec![
            FieldSchema::new("code", "Pay Code", FieldFormat::Code)
                .required()
                .aliases(&["Code", "Earning Code", "Pay Code ID"]),
            FieldSchema::new("description", "Description", FieldFormat::Text)
                .required()
                .aliases(&["Name", "Pay Code Name", "Desc"]),
            FieldSchema::new("category", "Category", FieldFormat::Enum)
                .required()
                .aliases(&["Type", "Pay Code Type", "Class"])
                .options(&["earning", "deduction", "benefit", "reimbursement"]),
            FieldSchema::new("rate_multiplier", "Rate Multiplier", FieldFormat::Rate)
                .aliases(&["Multiplier", "Factor", "Premium"]),
            FieldSchema::new("taxable", "Taxable", FieldFormat::Boolean)
                .aliases(&["Is Taxable", "Tax"]),
            FieldSchema::new("effective_date", "Effective Date", FieldFormat::Date)
                .aliases(&["Effective", "Valid From"]),
        ],
        rules: vec![
            ValidationRule::Range {
                field: "rate_multiplier".to_string(),
                min: Some(0.0),
                max: None,
                severity: Severity::Error,
            },
            ValidationRule::Range {
                field: "rate_multiplier".to_string(),
                min: None,
                max: Some(5.0),
                severity: Severity::Warning,
            },
        ],
        business_key: vec!["code".to_string()],
    }
}

// ==========================================
// 打卡记录
// ==========================================
pub fn time_punch_schema() -> ImportSchema {
    ImportSchema {
        entity: TIME_PUNCH.to_string(),
        fields: vec![
            FieldSchema::new("device_id", "Device ID", FieldFormat::Code)
                .required()
                .aliases(&["Device", "Clock", "Clock ID", "Terminal"]),
            FieldSchema::new("badge_number", "Badge Number", FieldFormat::Code)
                .required()
                .aliases(&["Badge", "Badge #", "Card", "Card Number"]),
            FieldSchema::new("punched_at", "Punch Time", FieldFormat::Timestamp)
                .required()
                .aliases(&["Timestamp", "Punch Date/Time", "Date Time", "Time"]),
            FieldSchema::new("direction", "Direction", FieldFormat::Enum)
                .required()
                .aliases(&["In/Out", "Punch Type", "Type"])
                .options(&["in", "out"]),
        ],
        rules: vec![ValidationRule::NotInFuture {
            field: "punched_at".to_string(),
            severity: Severity::Warning,
        }],
        business_key: vec![
            "device_id".to_string(),
            "badge_number".to_string(),
            "punched_at".to_string(),
            "direction".to_string(),
        ],
    }
}
