use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr};

const DEFAULT_NAME_FIELD: &str = "name";
const DEFAULT_ADDRESS_FIELDS: [&str; 2] = ["email", "address"];

pub(crate) fn format_email_address_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields
                .named
                .iter()
                .filter_map(|f| f.ident.clone())
                .collect::<Vec<Ident>>(),
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "FormatEmailAddress can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "FormatEmailAddress can only be derived for structs",
            ))
        }
    };

    let mut name_field: Option<LitStr> = None;
    let mut address_field: Option<LitStr> = None;

    for attr in &input.attrs {
        if attr.path().is_ident("email_address") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    name_field = Some(meta.value()?.parse()?);
                    Ok(())
                } else if meta.path.is_ident("address") {
                    address_field = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `name` or `address`"))
                }
            })?;
        }
    }

    let find = |lit: &LitStr| -> syn::Result<Ident> {
        fields
            .iter()
            .find(|f| *f == &lit.value())
            .cloned()
            .ok_or_else(|| syn::Error::new(lit.span(), format!("no field named `{}`", lit.value())))
    };

    let address = match &address_field {
        Some(lit) => find(lit)?,
        None => fields
            .iter()
            .find(|f| DEFAULT_ADDRESS_FIELDS.iter().any(|d| *f == d))
            .cloned()
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    ident,
                    "no `email` or `address` field; add #[email_address(address = \"...\")]",
                )
            })?,
    };

    let name = match &name_field {
        Some(lit) => Some(find(lit)?),
        None => fields.iter().find(|f| *f == DEFAULT_NAME_FIELD).cloned(),
    };

    let name_expr = match name {
        Some(name) => quote! { ::std::string::ToString::to_string(&self.#name) },
        None => quote! { ::std::string::String::new() },
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::courier::FormatEmailAddress for #ident #ty_generics #where_clause {
            fn format_email_address(
                &self,
                _ctx: &::courier::FormatContext,
            ) -> ::courier::Recipient {
                ::courier::Recipient::Address(::courier::Address::new(
                    #name_expr,
                    ::std::string::ToString::to_string(&self.#address),
                ))
            }
        }

        impl #impl_generics ::std::convert::From<#ident #ty_generics> for ::courier::Recipient #where_clause {
            fn from(value: #ident #ty_generics) -> Self {
                ::courier::Recipient::formattable(value)
            }
        }
    })
}
