use std::{collections::BTreeMap, fmt};

use thiserror::Error;

use crate::models::{Layout, Page, Role};

/// Route Table Module Index
///
/// The portal's pages are segregated into three access families, one module
/// each. Every family is an ordered list; within a family the first descriptor
/// whose pattern matches a path wins.
///
/// Pages meant for anonymous visitors only (the login screen).
pub mod public;

/// Pages gated by an explicit allow-list of roles.
pub mod protected;

/// Management pages restricted to the admin role.
pub mod admin;

/// Path the resolver sends anonymous visitors to.
pub const LOGIN_PATH: &str = "/auth/login";

/// Captured `:name` segments of a matched pattern.
pub type RouteParams = BTreeMap<String, String>;

/// RouteClass
///
/// The resolution family a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Public,
    Protected,
    AdminOnly,
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteClass::Public => "public",
            RouteClass::Protected => "protected",
            RouteClass::AdminOnly => "admin-only",
        })
    }
}

/// RouteDescriptor
///
/// One navigable page: a path pattern, the family that decides access, the
/// roles allowed in (protected routes only) and the page/layout to mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub path: &'static str,
    pub class: RouteClass,
    /// Ignored outside `RouteClass::Protected`. An empty list locks everyone out.
    pub allowed_roles: &'static [Role],
    pub page: Page,
    pub layout: Layout,
}

impl RouteDescriptor {
    pub const fn public(path: &'static str, page: Page) -> Self {
        Self {
            path,
            class: RouteClass::Public,
            allowed_roles: &[],
            page,
            layout: Layout::None,
        }
    }

    pub const fn protected(path: &'static str, page: Page, allowed_roles: &'static [Role]) -> Self {
        Self {
            path,
            class: RouteClass::Protected,
            allowed_roles,
            page,
            layout: Layout::Default,
        }
    }

    pub const fn admin_only(path: &'static str, page: Page) -> Self {
        Self {
            path,
            class: RouteClass::AdminOnly,
            allowed_roles: &[],
            page,
            layout: Layout::Default,
        }
    }

    pub const fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Whether `role` is on this descriptor's allow-list.
    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }

    /// match_path
    ///
    /// Matches a request path against this descriptor's pattern. The query
    /// string, fragment and empty segments are ignored. Literal segments compare
    /// exactly; a `:name` segment matches any non-empty segment and is captured.
    pub fn match_path(&self, path: &str) -> Option<RouteParams> {
        let mut wanted = segments(self.path);
        let mut given = segments(strip_suffixes(path));
        let mut params = RouteParams::new();

        loop {
            match (wanted.next(), given.next()) {
                (None, None) => return Some(params),
                (Some(pattern), Some(segment)) => match pattern.strip_prefix(':') {
                    Some(name) => {
                        params.insert(name.to_string(), segment.to_string());
                    }
                    None if pattern == segment => {}
                    None => return None,
                },
                _ => return None,
            }
        }
    }
}

fn strip_suffixes(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or_default()
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// CatchAll
///
/// What the resolver does when no family matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatchAll {
    /// Every unmatched path goes to the login page, whatever the session.
    #[default]
    RedirectToLogin,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteTableError {
    #[error("route pattern `{path}` is malformed: {reason}")]
    MalformedPath { path: &'static str, reason: &'static str },

    #[error("route pattern `{path}` is declared twice in the {class} family")]
    DuplicatePath { class: RouteClass, path: &'static str },

    #[error("route `{path}` is a {found} route but was listed in the {expected} family")]
    MisplacedDescriptor {
        path: &'static str,
        expected: RouteClass,
        found: RouteClass,
    },
}

/// RouteTable
///
/// The immutable navigation configuration: three ordered families plus the
/// catch-all policy. Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RouteTable {
    public: Vec<RouteDescriptor>,
    protected: Vec<RouteDescriptor>,
    admin: Vec<RouteDescriptor>,
    catch_all: CatchAll,
}

impl RouteTable {
    /// Validates and assembles a table. Rejects malformed patterns, descriptors
    /// filed under the wrong family and duplicate paths within one family.
    pub fn new(
        public: Vec<RouteDescriptor>,
        protected: Vec<RouteDescriptor>,
        admin: Vec<RouteDescriptor>,
    ) -> Result<Self, RouteTableError> {
        validate_family(RouteClass::Public, &public)?;
        validate_family(RouteClass::Protected, &protected)?;
        validate_family(RouteClass::AdminOnly, &admin)?;

        Ok(Self {
            public,
            protected,
            admin,
            catch_all: CatchAll::default(),
        })
    }

    /// The portal's route table.
    pub fn standard() -> Result<Self, RouteTableError> {
        Self::new(public::routes(), protected::routes(), admin::routes())
    }

    pub fn with_catch_all(mut self, catch_all: CatchAll) -> Self {
        self.catch_all = catch_all;
        self
    }

    pub fn catch_all(&self) -> CatchAll {
        self.catch_all
    }

    pub fn family(&self, class: RouteClass) -> &[RouteDescriptor] {
        match class {
            RouteClass::Public => &self.public,
            RouteClass::Protected => &self.protected,
            RouteClass::AdminOnly => &self.admin,
        }
    }

    /// First descriptor of `class` matching `path`, in declaration order.
    pub fn first_match(&self, class: RouteClass, path: &str) -> Option<(&RouteDescriptor, RouteParams)> {
        self.family(class)
            .iter()
            .find_map(|descriptor| descriptor.match_path(path).map(|params| (descriptor, params)))
    }
}

fn validate_family(class: RouteClass, family: &[RouteDescriptor]) -> Result<(), RouteTableError> {
    for (index, descriptor) in family.iter().enumerate() {
        if descriptor.class != class {
            return Err(RouteTableError::MisplacedDescriptor {
                path: descriptor.path,
                expected: class,
                found: descriptor.class,
            });
        }
        validate_pattern(descriptor.path)?;
        if family[..index].iter().any(|earlier| earlier.path == descriptor.path) {
            return Err(RouteTableError::DuplicatePath {
                class,
                path: descriptor.path,
            });
        }
    }
    Ok(())
}

fn validate_pattern(path: &'static str) -> Result<(), RouteTableError> {
    let malformed = |reason| RouteTableError::MalformedPath { path, reason };

    if !path.starts_with('/') {
        return Err(malformed("must start with `/`"));
    }
    if path.contains(['?', '#']) {
        return Err(malformed("must not carry a query or fragment"));
    }
    let mut names = Vec::new();
    for name in segments(path).filter_map(|segment| segment.strip_prefix(':')) {
        if name.is_empty() {
            return Err(malformed("parameter segment needs a name"));
        }
        if names.contains(&name) {
            return Err(malformed("parameter name used twice"));
        }
        names.push(name);
    }
    Ok(())
}
