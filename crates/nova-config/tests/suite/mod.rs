mod diagnostics;
mod loading;
mod schema_rules;
