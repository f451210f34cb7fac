use crate::query::range::TimeRange;

/// Builder for the bracketed `filter[...]` query parameters the CRM accepts.
///
/// Parameters are emitted in a fixed order regardless of the order the
/// builder methods were called in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterBuilder {
    created: Option<(i64, i64)>,
    closed: Option<(i64, i64)>,
    pipeline_id: Option<String>,
    responsible_user_id: Option<String>,
    is_completed: Option<bool>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leads created within `range`.
    pub fn created_in(mut self, range: &TimeRange) -> Self {
        self.created = Some((range.from_epoch(), range.to_epoch_inclusive()));
        self
    }

    /// Leads closed within `range`.
    pub fn closed_in(mut self, range: &TimeRange) -> Self {
        self.closed = Some((range.from_epoch(), range.to_epoch_inclusive()));
        self
    }

    pub fn pipeline(mut self, id: Option<&str>) -> Self {
        self.pipeline_id = id.map(str::to_string);
        self
    }

    pub fn responsible_user(mut self, id: Option<&str>) -> Self {
        self.responsible_user_id = id.map(str::to_string);
        self
    }

    pub fn completed(mut self, val: bool) -> Self {
        self.is_completed = Some(val);
        self
    }

    /// Render as ordered query pairs.
    pub fn build(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some((from, to)) = self.created {
            params.push(("filter[created_at][from]".to_string(), from.to_string()));
            params.push(("filter[created_at][to]".to_string(), to.to_string()));
        }
        if let Some((from, to)) = self.closed {
            params.push(("filter[closed_at][from]".to_string(), from.to_string()));
            params.push(("filter[closed_at][to]".to_string(), to.to_string()));
        }
        if let Some(ref id) = self.pipeline_id {
            params.push(("filter[pipeline_id]".to_string(), id.clone()));
        }
        if let Some(ref id) = self.responsible_user_id {
            params.push(("filter[responsible_user_id]".to_string(), id.clone()));
        }
        if let Some(completed) = self.is_completed {
            let flag = if completed { "1" } else { "0" };
            params.push(("filter[is_completed]".to_string(), flag.to_string()));
        }

        params
    }
}
