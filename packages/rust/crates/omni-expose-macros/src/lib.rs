//! # omni-expose-macros
//!
//! The `#[expose]` attribute: one declaration that makes a function reachable
//! through every transport `omni-expose` serves.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use omni_expose::{Output, expose};
//!
//! /// Greet someone by name.
//! ///
//! /// # Arguments
//! ///
//! /// * `name` - Who to greet.
//! #[expose(methods(GET), interfaces(api, cli), defaults(name = "World"))]
//! fn greet(name: String) -> Output {
//!     Output::ok(format!("Hello, {name}"))
//! }
//! ```
//!
//! ## Arguments
//!
//! - `name = "..."` - exposed name (defaults to the function name)
//! - `methods(GET, POST, PUT, DELETE)` - HTTP methods of the API route
//! - `interfaces(api, cli, tool)` - transports that expose the function
//! - `defaults(param = <expr>, ...)` - default values, any `serde_json::json!` expression
//! - `choices(param = [<expr>, ...], ...)` - the only values a parameter accepts
//!
//! The function itself is emitted unchanged. Next to it the macro emits a
//! builder for its `FunctionDef` and an `inventory` record pointing at that
//! builder; nothing is registered until autodiscovery loads the source file.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{
    Attribute, Expr, ExprArray, FnArg, Ident, ItemFn, LitStr, Pat, ReturnType, Token, Type,
    parse_macro_input,
};

const METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];
const INTERFACES: [&str; 3] = ["api", "cli", "tool"];

/// Expose a free function through the registry.
#[proc_macro_attribute]
pub fn expose(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ExposeArgs);
    let function = parse_macro_input!(item as ItemFn);
    expand(&args, &function)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

// ============================================================================
// Attribute arguments
// ============================================================================

#[derive(Default)]
struct ExposeArgs {
    name: Option<LitStr>,
    methods: Vec<Ident>,
    interfaces: Vec<Ident>,
    defaults: Vec<Assignment<Expr>>,
    choices: Vec<Assignment<ExprArray>>,
}

struct Assignment<V> {
    key: Ident,
    value: V,
}

impl<V: Parse> Parse for Assignment<V> {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let key = input.parse()?;
        input.parse::<Token![=]>()?;
        let value = input.parse()?;
        Ok(Self { key, value })
    }
}

impl Parse for ExposeArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = Self::default();
        while !input.is_empty() {
            let key: Ident = input.parse()?;
            match key.to_string().as_str() {
                "name" => {
                    input.parse::<Token![=]>()?;
                    args.name = Some(input.parse()?);
                }
                "methods" => args.methods.extend(parse_keyword_list(input, &METHODS)?),
                "interfaces" => args
                    .interfaces
                    .extend(parse_keyword_list(input, &INTERFACES)?),
                "defaults" => args.defaults.extend(parse_assignments(input)?),
                "choices" => args.choices.extend(parse_assignments(input)?),
                _ => {
                    return Err(syn::Error::new_spanned(
                        &key,
                        "unknown expose argument; expected name, methods, interfaces, defaults or choices",
                    ));
                }
            }
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }
        Ok(args)
    }
}

fn parse_keyword_list(input: ParseStream, allowed: &[&str]) -> syn::Result<Vec<Ident>> {
    let content;
    syn::parenthesized!(content in input);
    let idents = Punctuated::<Ident, Token![,]>::parse_terminated(&content)?;
    let mut out = Vec::with_capacity(idents.len());
    for ident in idents {
        if !allowed.contains(&ident.to_string().as_str()) {
            return Err(syn::Error::new_spanned(
                &ident,
                format!("expected one of {}", allowed.join(", ")),
            ));
        }
        out.push(ident);
    }
    Ok(out)
}

fn parse_assignments<V: Parse>(input: ParseStream) -> syn::Result<Vec<Assignment<V>>> {
    let content;
    syn::parenthesized!(content in input);
    let items = Punctuated::<Assignment<V>, Token![,]>::parse_terminated(&content)?;
    Ok(items.into_iter().collect())
}

// ============================================================================
// Expansion
// ============================================================================

struct Param {
    name: String,
    ty: Box<Type>,
}

fn expand(args: &ExposeArgs, function: &ItemFn) -> syn::Result<TokenStream2> {
    let sig = &function.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "exposed functions must be synchronous",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "exposed functions cannot be generic",
        ));
    }

    let params = collect_params(&sig.inputs)?;
    for key in args
        .defaults
        .iter()
        .map(|a| &a.key)
        .chain(args.choices.iter().map(|a| &a.key))
    {
        if !params.iter().any(|p| key == &p.name) {
            return Err(syn::Error::new_spanned(
                key,
                format!("`{key}` is not a parameter of `{}`", sig.ident),
            ));
        }
    }

    let fn_ident = &sig.ident;
    let exposed_name = args.name.as_ref().map_or_else(
        || fn_ident.to_string().trim_start_matches("r#").to_string(),
        LitStr::value,
    );
    let ident_text = fn_ident.to_string().trim_start_matches("r#").to_string();
    let builder = format_ident!("__omni_expose_def_{}", fn_ident);
    let doc = collect_doc(&function.attrs);

    let arg_idents: Vec<Ident> = (0..params.len())
        .map(|i| format_ident!("__arg{}", i))
        .collect();
    let arg_names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
    let arg_types: Vec<&Type> = params.iter().map(|p| p.ty.as_ref()).collect();

    let declared = params.iter().map(|param| {
        let name = &param.name;
        let type_text = param.ty.to_token_stream().to_string();
        let default = args
            .defaults
            .iter()
            .find(|a| a.key == name)
            .map(|a| {
                let value = &a.value;
                quote! { .default(::omni_expose::serde_json::json!(#value)) }
            });
        let choices = args.choices.iter().find(|a| a.key == name).map(|a| {
            let values = a.value.elems.iter();
            quote! { .choices([#(::omni_expose::serde_json::json!(#values)),*]) }
        });
        quote! { ::omni_expose::DeclaredParam::new(#name, #type_text) #default #choices }
    });

    let methods = args.methods.iter().map(|m| {
        let variant = match m.to_string().as_str() {
            "GET" => "Get",
            "POST" => "Post",
            "PUT" => "Put",
            _ => "Delete",
        };
        let variant = format_ident!("{}", variant);
        quote! { ::omni_expose::TransportMethod::#variant }
    });
    let interfaces = args.interfaces.iter().map(|i| {
        let variant = match i.to_string().as_str() {
            "api" => "Api",
            "cli" => "Cli",
            _ => "Tool",
        };
        let variant = format_ident!("{}", variant);
        quote! { ::omni_expose::InterfaceTag::#variant }
    });

    let (output, call) = match &sig.output {
        ReturnType::Default => (
            quote! { ::core::option::Option::None },
            quote! {
                #fn_ident(#(#arg_idents),*);
                ::core::result::Result::Err(::omni_expose::HandlerError::from(
                    ::omni_expose::ExecutionError::new("function declares no output contract"),
                ))
            },
        ),
        ReturnType::Type(_, ty) => (
            quote! {
                ::core::option::Option::Some(<#ty as ::omni_expose::OutputContract>::shape())
            },
            quote! {
                ::omni_expose::OutputContract::into_outcome(#fn_ident(#(#arg_idents),*))
                    .map_err(::omni_expose::HandlerError::from)
            },
        ),
    };

    Ok(quote! {
        #function

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #builder() -> ::omni_expose::FunctionDef {
            ::omni_expose::FunctionDef::new(
                #exposed_name,
                |kwargs: ::omni_expose::Kwargs| -> ::core::result::Result<
                    ::omni_expose::OutputEnvelope,
                    ::omni_expose::HandlerError,
                > {
                    #[allow(unused_mut, unused_variables)]
                    let mut kwargs = kwargs;
                    #( let #arg_idents: #arg_types = kwargs.take(#arg_names)?; )*
                    #call
                },
            )
            .doc(#doc)
            .params([#(#declared),*])
            .output(#output)
            .methods([#(#methods),*])
            .interfaces([#(#interfaces),*])
            .source(::core::file!(), ::core::module_path!())
        }

        #[allow(unsafe_code)]
        const _: () = {
            ::omni_expose::inventory::submit! {
                ::omni_expose::ExposedFunction {
                    name: #exposed_name,
                    ident: #ident_text,
                    source_file: ::core::file!(),
                    module_path: ::core::module_path!(),
                    build: #builder,
                }
            }
        };
    })
}

fn collect_params(inputs: &Punctuated<FnArg, Token![,]>) -> syn::Result<Vec<Param>> {
    inputs
        .iter()
        .map(|input| match input {
            FnArg::Receiver(receiver) => Err(syn::Error::new_spanned(
                receiver,
                "methods cannot be exposed; use a free function",
            )),
            FnArg::Typed(pat_type) => {
                let Pat::Ident(pat) = pat_type.pat.as_ref() else {
                    return Err(syn::Error::new_spanned(
                        &pat_type.pat,
                        "exposed parameters must be plain identifiers",
                    ));
                };
                if let Type::Reference(reference) = pat_type.ty.as_ref() {
                    return Err(syn::Error::new_spanned(
                        reference,
                        "exposed parameters must be owned types",
                    ));
                }
                Ok(Param {
                    name: pat.ident.to_string().trim_start_matches("r#").to_string(),
                    ty: pat_type.ty.clone(),
                })
            }
        })
        .collect()
}

/// Rustdoc text of the function, one leading space stripped per line.
fn collect_doc(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(text),
                    ..
                }) => Some(text.value()),
                _ => None,
            },
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').unwrap_or(&line).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
