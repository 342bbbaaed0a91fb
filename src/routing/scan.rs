//! Declarative route registration for controller types.
//!
//! `#[routes]` implements [`Routable`] for a controller; [`RouteTable::scan`]
//! turns its member declarations into ordinary `register` calls.

use crate::error::RouteError;
use crate::handler::{Controller, Handler};
use crate::http::MethodSet;
use crate::routing::table::RouteTable;
use tracing::debug;

/// One routed member of a controller.
#[derive(Debug, Clone)]
pub struct Member {
    /// Member name, used to derive a path for method-only declarations.
    pub name: &'static str,
    /// Declarations such as `"GET|POST /items/{id}"` or just `"GET"`.
    pub declarations: &'static [&'static str],
    pub handler: Handler,
}

/// A controller whose routes are declared on its members.
pub trait Routable: Controller {
    /// Explicit path prefix. `None` derives one from the type name.
    const PREFIX: Option<&'static str> = None;

    /// Routed members in declaration order.
    fn members() -> Vec<Member>;
}

impl RouteTable {
    /// Register every route declared by `C`, in member order.
    pub fn scan<C: Routable>(&mut self) -> Result<&mut Self, RouteError> {
        let prefix = match C::PREFIX {
            Some(prefix) => prefix.trim_end_matches('/').to_string(),
            None => derive_path(C::name()),
        };

        for member in C::members() {
            for declaration in member.declarations {
                let (methods, path) = parse_declaration(declaration)?;
                let path = match path {
                    Some(path) => path.to_string(),
                    None if member.declarations.len() == 1 => derive_path(member.name),
                    None => {
                        return Err(RouteError::AmbiguousDerivedPath {
                            member: member.name.to_string(),
                        })
                    }
                };
                let path = if !prefix.is_empty() && path == "/" { "" } else { path.as_str() };
                let full = format!("{}{}", prefix, path);
                debug!("scanned route: {} {} ({}::{})", methods, full, C::name(), member.name);
                self.register(methods, &full, member.handler.clone())?;
            }
        }
        Ok(self)
    }
}

/// Split `"GET|POST /path"` into its method set and optional path.
fn parse_declaration(declaration: &str) -> Result<(MethodSet, Option<&str>), RouteError> {
    let declaration = declaration.trim();
    let (methods, path) = match declaration.split_once(char::is_whitespace) {
        Some((methods, path)) => (methods, Some(path.trim())),
        None => (declaration, None),
    };
    if path.is_some_and(|p| !p.starts_with('/')) {
        return Err(RouteError::InvalidDeclaration(declaration.to_string()));
    }
    let methods = MethodSet::parse(methods)
        .map_err(|_| RouteError::InvalidDeclaration(declaration.to_string()))?;
    Ok((methods, path))
}

/// Split an identifier into words.
///
/// `_` and `-` separate words; a boundary also falls before an uppercase
/// letter following a non-uppercase one, before the last uppercase letter of
/// a run when a lowercase letter follows (`HTMLParser` is `HTML`, `Parser`),
/// and between letters and non-letters.
pub fn split_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(&prev) = i.checked_sub(1).map(|j| &chars[j]) {
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = (c.is_uppercase() && !prev.is_uppercase())
                || (c.is_uppercase() && prev.is_uppercase() && next_lower)
                || (c.is_alphabetic() != prev.is_alphabetic());
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `UserProfile` and `user_profile` both become `/user-profile`.
pub fn derive_path(name: &str) -> String {
    format!("/{}", split_words(name).join("-").to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Args, ControllerBase, HandlerSpec};
    use crate::http::{Method, Response};
    use crate::routing::RouteMatch;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("UserProfile"), vec!["User", "Profile"]);
        assert_eq!(split_words("HTMLParser"), vec!["HTML", "Parser"]);
        assert_eq!(split_words("list_items"), vec!["list", "items"]);
        assert_eq!(split_words("listItems"), vec!["list", "Items"]);
        assert_eq!(split_words("Api2Keys"), vec!["Api", "2", "Keys"]);
        assert_eq!(split_words("__x--y"), vec!["x", "y"]);
        assert!(split_words("").is_empty());
    }

    #[test]
    fn test_derive_path() {
        assert_eq!(derive_path("UserProfile"), "/user-profile");
        assert_eq!(derive_path("list_items"), "/list-items");
        assert_eq!(derive_path("listItems"), "/list-items");
    }

    #[test]
    fn test_parse_declaration() {
        let (methods, path) = parse_declaration("GET|POST /items/{id}").unwrap();
        assert_eq!(methods, MethodSet::from([Method::Get, Method::Post]));
        assert_eq!(path, Some("/items/{id}"));

        let (methods, path) = parse_declaration("DELETE").unwrap();
        assert_eq!(methods, MethodSet::from(Method::Delete));
        assert_eq!(path, None);

        assert!(parse_declaration("GET items").is_err());
        assert!(parse_declaration("FETCH /x").is_err());
    }

    struct UserProfile;

    impl Controller for UserProfile {
        fn new(_base: ControllerBase) -> Self {
            UserProfile
        }
    }

    fn member(name: &'static str, declarations: &'static [&'static str]) -> Member {
        Member {
            name,
            declarations,
            handler: Handler::method::<UserProfile, _, _>(
                HandlerSpec::named(name),
                name,
                |_: &mut UserProfile, _: Args| Response::ok(),
            ),
        }
    }

    impl Routable for UserProfile {
        fn members() -> Vec<Member> {
            vec![
                member("index", &["GET /"]),
                member("show", &["GET /{id}"]),
                member("edit_avatar", &["POST"]),
                member("update", &["PUT|PATCH //{id}//"]),
            ]
        }
    }

    struct Api;

    impl Controller for Api {
        fn new(_base: ControllerBase) -> Self {
            Api
        }
    }

    impl Routable for Api {
        const PREFIX: Option<&'static str> = Some("");

        fn members() -> Vec<Member> {
            vec![Member {
                name: "health",
                declarations: &["GET"],
                handler: Handler::function(HandlerSpec::named("health"), |_| Response::ok()),
            }]
        }
    }

    struct Broken;

    impl Controller for Broken {
        fn new(_base: ControllerBase) -> Self {
            Broken
        }
    }

    impl Routable for Broken {
        fn members() -> Vec<Member> {
            vec![Member {
                name: "save",
                declarations: &["GET", "POST /save"],
                handler: Handler::function(HandlerSpec::named("save"), |_| Response::ok()),
            }]
        }
    }

    fn matched(table: &crate::routing::CompiledRouteTable, method: Method, path: &str) -> Option<String> {
        match table.match_route(method, path) {
            RouteMatch::Matched { route, .. } => Some(route.handler().id().to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_scan_derives_prefix_and_paths() {
        let mut table = RouteTable::new();
        table.scan::<UserProfile>().unwrap();
        let patterns: Vec<_> = table.routes().iter().map(|r| r.pattern().to_string()).collect();
        assert_eq!(
            patterns,
            vec![
                "/user-profile",
                "/user-profile/{id}",
                "/user-profile/edit-avatar",
                "/user-profile/{id}",
            ]
        );

        let table = table.freeze();
        assert_eq!(matched(&table, Method::Get, "/user-profile").as_deref(), Some("index"));
        assert_eq!(matched(&table, Method::Patch, "/user-profile/3").as_deref(), Some("update"));
        assert_eq!(matched(&table, Method::Post, "/user-profile/edit-avatar").as_deref(), Some("edit_avatar"));
    }

    #[test]
    fn test_scan_with_empty_prefix() {
        let mut table = RouteTable::new();
        table.scan::<Api>().unwrap();
        assert_eq!(table.routes()[0].pattern().as_str(), "/health");
    }

    #[test]
    fn test_method_only_declaration_must_be_alone() {
        let mut table = RouteTable::new();
        let err = table.scan::<Broken>().unwrap_err();
        assert_eq!(err, RouteError::AmbiguousDerivedPath { member: "save".into() });
    }
}
