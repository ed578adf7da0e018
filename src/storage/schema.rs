//! Database schema definitions using sea-query.
//!
//! Table names carry a configurable prefix, so tables are addressed through
//! [`TableNames`] while columns use the static [`Services`] identifiers.

use sea_query::{Alias, Iden};

/// Columns of the services table.
#[derive(Iden)]
pub enum Services {
    #[iden = "name"]
    Name,
    #[iden = "type"]
    Type,
    #[iden = "policies"]
    Policies,
    #[iden = "role_policies"]
    RolePolicies,
    #[iden = "metadata"]
    Metadata,
}

/// Prefixed table and object names.
#[derive(Debug, Clone)]
pub struct TableNames {
    prefix: String,
}

impl TableNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Unquoted services table name, as reported by the change trigger.
    pub fn services(&self) -> String {
        format!("{}services", self.prefix)
    }

    /// Services table for sea-query statements.
    pub fn services_table(&self) -> Alias {
        Alias::new(self.services())
    }

    /// Services table quoted for raw SQL.
    pub fn services_quoted(&self) -> String {
        quote_ident(&self.services())
    }

    fn notify_function(&self) -> String {
        quote_ident(&format!("{}notify_change", self.prefix))
    }

    fn notify_trigger(&self) -> String {
        quote_ident(&format!("{}services_notify", self.prefix))
    }

    /// Statements creating the services table, in execution order.
    pub fn create_services_table(&self) -> Vec<String> {
        vec![format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                name TEXT PRIMARY KEY,
                type TEXT NOT NULL DEFAULT '',
                policies JSONB NOT NULL DEFAULT '[]'::jsonb,
                role_policies JSONB NOT NULL DEFAULT '[]'::jsonb,
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb
            )",
            table = self.services_quoted()
        )]
    }

    /// Statements installing the row trigger that publishes
    /// `{table, action, data}` on `channel`. INSERT is reported as CREATE.
    pub fn create_notify_trigger(&self, channel: &str) -> Vec<String> {
        vec![
            format!(
                "CREATE OR REPLACE FUNCTION {function}() RETURNS trigger AS $$
                DECLARE
                    row_data RECORD;
                    change_action TEXT;
                BEGIN
                    IF TG_OP = 'DELETE' THEN
                        row_data := OLD;
                    ELSE
                        row_data := NEW;
                    END IF;
                    IF TG_OP = 'INSERT' THEN
                        change_action := 'CREATE';
                    ELSE
                        change_action := TG_OP;
                    END IF;
                    PERFORM pg_notify(
                        {channel},
                        json_build_object(
                            'table', TG_TABLE_NAME,
                            'action', change_action,
                            'data', row_to_json(row_data)
                        )::text
                    );
                    RETURN NULL;
                END;
                $$ LANGUAGE plpgsql",
                function = self.notify_function(),
                channel = quote_literal(channel),
            ),
            format!(
                "DROP TRIGGER IF EXISTS {trigger} ON {table}",
                trigger = self.notify_trigger(),
                table = self.services_quoted()
            ),
            format!(
                "CREATE TRIGGER {trigger}
                AFTER INSERT OR UPDATE OR DELETE ON {table}
                FOR EACH ROW EXECUTE FUNCTION {function}()",
                trigger = self.notify_trigger(),
                table = self.services_quoted(),
                function = self.notify_function()
            ),
        ]
    }
}

/// Quote an SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
