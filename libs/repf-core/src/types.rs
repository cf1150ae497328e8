//! Domain structures carried as rule arguments

// ============================================================================
// Key/value pairs
// ============================================================================

/// Ordered keyword/value collection (condition inputs, registration params)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValPair {
    pairs: Vec<(String, String)>,
}

impl KeyValPair {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `keyword`
    pub fn add(&mut self, keyword: impl Into<String>, value: impl Into<String>) {
        let keyword = keyword.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == keyword) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((keyword, value)),
        }
    }

    pub fn with(mut self, keyword: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(keyword, value);
        self
    }

    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, keyword: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == keyword)?;
        Some(self.pairs.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ============================================================================
// Data object and collection requests
// ============================================================================

/// Data object request descriptor (open, create, put, get, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataObjInp {
    pub obj_path: String,
    pub create_mode: i32,
    pub open_flags: i32,
    pub offset: i64,
    pub data_size: i64,
    pub num_threads: i32,
    pub opr_type: i32,
    pub cond_input: KeyValPair,
}

/// Catalog view of one replica
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataObjInfo {
    pub logical_path: String,
    pub resc_hier: String,
    pub data_type: String,
    pub data_size: i64,
    pub checksum: String,
    pub version: String,
    pub physical_path: String,
    pub data_owner_name: String,
    pub data_owner_zone: String,
    pub replica_number: i32,
    pub replica_status: i32,
    pub data_id: i64,
    pub coll_id: i64,
    pub data_comments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollInp {
    pub coll_name: String,
    pub flags: i32,
    pub opr_type: i32,
    pub cond_input: KeyValPair,
}

// ============================================================================
// Users and connections
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub user_name: String,
    pub rods_zone: String,
    pub user_type: String,
}

impl UserInfo {
    pub fn new(user_name: impl Into<String>, rods_zone: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            rods_zone: rods_zone.into(),
            user_type: "rodsuser".to_string(),
        }
    }
}

/// Client connection as seen by the agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub client_addr: String,
    pub auth_scheme: Option<String>,
    pub proxy_user: UserInfo,
    pub client_user: UserInfo,
}

// ============================================================================
// General query
// ============================================================================

/// Catalog query input: selected columns and conditions keyed by attribute index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenQueryInp {
    pub max_rows: i32,
    pub continue_inx: i32,
    pub row_offset: i32,
    pub options: i32,
    pub cond_input: KeyValPair,
    /// (attribute index, select option)
    pub select: Vec<(i32, i32)>,
    /// (attribute index, condition text)
    pub conditions: Vec<(i32, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenQueryColumn {
    pub attribute_index: i32,
    /// Maximum value length for the column
    pub len: i32,
    /// One value per row
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenQueryOut {
    pub continue_inx: i32,
    pub total_row_count: i32,
    pub columns: Vec<GenQueryColumn>,
}

impl GenQueryOut {
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn attribute_count(&self) -> usize {
        self.columns.len()
    }
}
