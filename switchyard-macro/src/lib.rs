//! Procedural macros for Switchyard handlers.
//!
//! Handlers receive their arguments by parameter name. These macros read the
//! names (and defaults) from the signature at compile time and emit a static
//! `HandlerSpec`, so nothing is inspected at runtime.
//!
//! # Example
//!
//! ```ignore
//! use switchyard::prelude::*;
//!
//! #[handler]
//! fn show_item(id: u64, #[default_value("json")] format: String) -> serde_json::Value {
//!     serde_json::json!({ "id": id, "format": format })
//! }
//!
//! #[routes(prefix = "/admin")]
//! impl Users {
//!     #[route("GET /{id}")]
//!     fn show(&mut self, id: u64) -> anyhow::Result<Response> { /* ... */ }
//!
//!     #[route("POST")]
//!     fn reset_password(&mut self, post: Params) -> Response { /* ... */ }
//! }
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, Expr, ExprLit, FnArg, ImplItem, ItemFn, ItemImpl,
    Lit, LitStr, Meta, Pat, Signature, Token, Type,
};

const DEFAULT_ATTR: &str = "default_value";
const ROUTE_ATTR: &str = "route";

/// Attributes for the `#[routes]` macro.
#[derive(Default, Debug)]
struct RoutesAttrs {
    /// Explicit path prefix; derived from the type name when absent.
    prefix: Option<String>,
}

impl RoutesAttrs {
    fn parse_meta_list(metas: Punctuated<Meta, Token![,]>) -> syn::Result<Self> {
        let mut attrs = RoutesAttrs::default();

        for meta in metas {
            match meta {
                Meta::NameValue(nv) => {
                    let ident = nv
                        .path
                        .get_ident()
                        .ok_or_else(|| syn::Error::new_spanned(&nv.path, "expected identifier"))?
                        .to_string();

                    let lit = match &nv.value {
                        Expr::Lit(ExprLit { lit, .. }) => lit.clone(),
                        _ => return Err(syn::Error::new_spanned(&nv.value, "expected literal")),
                    };

                    match (ident.as_str(), lit) {
                        ("prefix", Lit::Str(lit_str)) => attrs.prefix = Some(lit_str.value()),
                        ("prefix", other) => {
                            return Err(syn::Error::new_spanned(other, "prefix must be a string"));
                        }
                        _ => {
                            return Err(syn::Error::new_spanned(
                                nv.path,
                                format!("unknown attribute: {}", ident),
                            ));
                        }
                    }
                }
                _ => {
                    return Err(syn::Error::new_spanned(meta, "expected name = value"));
                }
            }
        }

        Ok(attrs)
    }
}

/// Where an unbound parameter falls back to.
enum Fallback {
    Required,
    Null,
    Text(String),
}

/// One declared handler parameter.
struct Param {
    name: String,
    ty: Type,
    fallback: Fallback,
}

impl Param {
    fn decl(&self) -> proc_macro2::TokenStream {
        let name = &self.name;
        match &self.fallback {
            Fallback::Required => quote! { ::switchyard::handler::ParamDecl::required(#name) },
            Fallback::Null => quote! { ::switchyard::handler::ParamDecl::optional(#name) },
            Fallback::Text(text) => {
                quote! { ::switchyard::handler::ParamDecl::with_default(#name, #text) }
            }
        }
    }
}

/// `static __PARAMS: [ParamDecl; N]` for a spec to borrow. `ParamDecl` has
/// drop glue, so a borrowed array literal would not be promoted to `'static`.
fn params_static(params: &[Param]) -> proc_macro2::TokenStream {
    let len = params.len();
    let decls = params.iter().map(Param::decl);
    quote! {
        static __PARAMS: [::switchyard::handler::ParamDecl; #len] = [#(#decls),*];
    }
}

/// Read parameter names, types and defaults, stripping `#[default_value]`.
/// Returns whether the signature has a receiver.
fn collect_params(sig: &mut Signature) -> syn::Result<(bool, Vec<Param>)> {
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(asyncness, "handlers must be synchronous"));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&sig.generics, "handlers cannot be generic"));
    }

    let mut has_receiver = false;
    let mut params = Vec::new();

    for input in sig.inputs.iter_mut() {
        let pat_type = match input {
            FnArg::Receiver(_) => {
                has_receiver = true;
                continue;
            }
            FnArg::Typed(pat_type) => pat_type,
        };

        let name = match pat_type.pat.as_ref() {
            Pat::Ident(pat_ident) => pat_ident.ident.to_string(),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "handler parameters must be plain identifiers; the name selects the value",
                ));
            }
        };
        if let Type::Reference(reference) = pat_type.ty.as_ref() {
            return Err(syn::Error::new_spanned(
                reference,
                "handler parameters must be owned types",
            ));
        }

        let mut fallback = if is_option(&pat_type.ty) {
            Fallback::Null
        } else {
            Fallback::Required
        };
        let mut kept = Vec::with_capacity(pat_type.attrs.len());
        for attr in pat_type.attrs.drain(..) {
            if attr.path().is_ident(DEFAULT_ATTR) {
                let value: LitStr = attr.parse_args()?;
                fallback = Fallback::Text(value.value());
            } else {
                kept.push(attr);
            }
        }
        pat_type.attrs = kept;

        params.push(Param {
            name,
            ty: (*pat_type.ty).clone(),
            fallback,
        });
    }

    Ok((has_receiver, params))
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}

/// `let __argN = __args.take::<T>("name")?;` for each parameter.
fn bind_args(params: &[Param]) -> (Vec<proc_macro2::TokenStream>, Vec<proc_macro2::Ident>) {
    let idents: Vec<_> = (0..params.len()).map(|i| format_ident!("__arg{}", i)).collect();
    let lets = params
        .iter()
        .zip(&idents)
        .map(|(param, ident)| {
            let name = &param.name;
            let ty = &param.ty;
            quote! { let #ident = __args.take::<#ty>(#name)?; }
        })
        .collect();
    (lets, idents)
}

fn args_pat(params: &[Param]) -> proc_macro2::TokenStream {
    if params.is_empty() {
        quote! { _: ::switchyard::handler::Args }
    } else {
        quote! { mut __args: ::switchyard::handler::Args }
    }
}

/// The `#[handler]` attribute macro for free-function handlers.
///
/// Emits a `{NAME}_SPEC` static and a unit struct `{Name}Handler` that
/// converts into a `Handler`, so routes register it directly:
///
/// ```ignore
/// #[handler]
/// fn show_item(id: u64, get: Params) -> anyhow::Result<Json<Item>> { /* ... */ }
///
/// routes.get("/items/{id}", ShowItemHandler)?;
/// ```
///
/// Parameters of type `Option<T>` are optional; `#[default_value("...")]`
/// supplies a textual default.
#[proc_macro_attribute]
pub fn handler(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = proc_macro2::TokenStream::from(args);
    let input_fn = parse_macro_input!(input as ItemFn);

    if !args.is_empty() {
        return syn::Error::new_spanned(args, "#[handler] takes no arguments")
            .to_compile_error()
            .into();
    }

    match generate_handler(input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_handler(mut input_fn: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let (has_receiver, params) = collect_params(&mut input_fn.sig)?;
    if has_receiver {
        return Err(syn::Error::new_spanned(
            &input_fn.sig,
            "#[handler] is for free functions; use #[routes] on the impl block for methods",
        ));
    }

    let fn_name = &input_fn.sig.ident;
    let fn_vis = &input_fn.vis;
    let spec_name = format_ident!("{}_SPEC", fn_name.to_string().to_uppercase());
    let struct_name = format_ident!("{}Handler", to_pascal_case(&fn_name.to_string()));
    let params_static = params_static(&params);
    let (lets, idents) = bind_args(&params);
    let args_pat = args_pat(&params);

    let expanded = quote! {
        #input_fn

        /// Generated parameter declarations.
        #[allow(dead_code)]
        #fn_vis static #spec_name: ::switchyard::handler::HandlerSpec = {
            #params_static
            ::switchyard::handler::HandlerSpec::new(
                concat!(module_path!(), "::", stringify!(#fn_name)),
                &__PARAMS,
            )
        };

        /// Generated route target for the handler function.
        #[derive(Debug, Clone, Copy, Default)]
        #fn_vis struct #struct_name;

        impl #struct_name {
            /// Get the declared parameters.
            pub fn spec() -> &'static ::switchyard::handler::HandlerSpec {
                &#spec_name
            }
        }

        impl ::core::convert::From<#struct_name> for ::switchyard::handler::Handler {
            fn from(_: #struct_name) -> Self {
                ::switchyard::handler::Handler::function(
                    ::core::clone::Clone::clone(&#spec_name),
                    |#args_pat| {
                        #(#lets)*
                        ::core::result::Result::Ok::<_, ::switchyard::error::InputError>(
                            #fn_name(#(#idents),*)
                        )
                    },
                )
            }
        }
    };

    Ok(expanded)
}

/// The `#[routes]` attribute macro for controller impl blocks.
///
/// Every method carrying `#[route("METHODS /path")]` (or a method-only
/// `#[route("GET")]`, whose path is derived from the method name) becomes a
/// member of the generated `Routable` implementation. The type must also
/// implement `Controller`.
///
/// # Attributes
///
/// - `prefix` (optional): path prefix; defaults to the word-split type name
#[proc_macro_attribute]
pub fn routes(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_impl = parse_macro_input!(input as ItemImpl);

    match generate_routes(args, input_impl) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_routes(
    args: Punctuated<Meta, Token![,]>,
    mut input_impl: ItemImpl,
) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = RoutesAttrs::parse_meta_list(args)?;

    if let Some((_, path, _)) = &input_impl.trait_ {
        return Err(syn::Error::new_spanned(path, "#[routes] goes on an inherent impl block"));
    }
    if !input_impl.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input_impl.generics,
            "#[routes] does not support generic controllers",
        ));
    }

    let self_ty = input_impl.self_ty.clone();
    let mut members = Vec::new();

    for item in input_impl.items.iter_mut() {
        let ImplItem::Fn(method) = item else {
            continue;
        };

        let mut declarations = Vec::new();
        let mut kept = Vec::with_capacity(method.attrs.len());
        for attr in method.attrs.drain(..) {
            if attr.path().is_ident(ROUTE_ATTR) {
                let list = attr.parse_args_with(Punctuated::<LitStr, Token![,]>::parse_terminated)?;
                if list.is_empty() {
                    return Err(syn::Error::new_spanned(attr, "expected #[route(\"METHODS /path\")]"));
                }
                declarations.extend(list);
            } else {
                kept.push(attr);
            }
        }
        method.attrs = kept;

        if declarations.is_empty() {
            continue;
        }

        let (has_receiver, params) = collect_params(&mut method.sig)?;
        let method_ident = &method.sig.ident;
        let method_name = method_ident.to_string();
        let params_static = params_static(&params);
        let (lets, idents) = bind_args(&params);
        let args_pat = args_pat(&params);

        let (this_pat, call) = if has_receiver {
            (quote! { __this }, quote! { __this.#method_ident(#(#idents),*) })
        } else {
            (quote! { _ }, quote! { <#self_ty>::#method_ident(#(#idents),*) })
        };

        members.push(quote! {
            {
                #params_static
                static __SPEC: ::switchyard::handler::HandlerSpec =
                    ::switchyard::handler::HandlerSpec::new(
                        concat!(module_path!(), "::", stringify!(#self_ty), "::", #method_name),
                        &__PARAMS,
                    );
                ::switchyard::routing::Member {
                    name: #method_name,
                    declarations: &[#(#declarations),*],
                    handler: ::switchyard::handler::Handler::method::<#self_ty, _, _>(
                        ::core::clone::Clone::clone(&__SPEC),
                        #method_name,
                        |#this_pat: &mut #self_ty, #args_pat| {
                            #(#lets)*
                            ::core::result::Result::Ok::<_, ::switchyard::error::InputError>(#call)
                        },
                    ),
                }
            }
        });
    }

    let prefix = attrs.prefix.map(|prefix| {
        quote! { const PREFIX: ::core::option::Option<&'static str> = ::core::option::Option::Some(#prefix); }
    });

    let expanded = quote! {
        #input_impl

        impl ::switchyard::routing::Routable for #self_ty {
            #prefix

            fn members() -> ::std::vec::Vec<::switchyard::routing::Member> {
                ::std::vec![#(#members),*]
            }
        }
    };

    Ok(expanded)
}

/// Convert a snake_case string to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}
