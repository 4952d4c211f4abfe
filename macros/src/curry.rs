use proc_macro2::TokenStream;

use super::*;

/// Curry a function.
pub fn expand(func: syn::ItemFn) -> Result<TokenStream> {
    let sig = &func.sig;
    if let Some(constness) = &sig.constness {
        bail!(constness, "const functions are not supported")
    }
    if let Some(asyncness) = &sig.asyncness {
        bail!(asyncness, "async functions are not supported")
    }
    if let Some(unsafety) = &sig.unsafety {
        bail!(unsafety, "unsafe functions are not supported")
    }
    if let Some(variadic) = &sig.variadic {
        bail!(variadic, "variadic functions are not supported")
    }
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        bail!(sig.generics, "generic functions are not supported")
    }

    let mut args = vec![];
    let mut types = vec![];
    for input in &sig.inputs {
        let typed = match input {
            syn::FnArg::Typed(typed) => typed,
            syn::FnArg::Receiver(_) => {
                bail!(input, "methods are not supported")
            }
        };

        let name = match typed.pat.as_ref() {
            syn::Pat::Ident(syn::PatIdent {
                by_ref: None,
                mutability: None,
                ident,
                subpat: None,
                ..
            }) => ident,
            pat => bail!(pat, "only simple identifiers are supported"),
        };

        args.push(name);
        types.push(typed.ty.as_ref());
    }

    // Nothing to curry.
    if args.len() < 2 {
        return Ok(quote! { #func });
    }

    // Boxed stages must own everything they capture.
    let last = args.len() - 1;
    if args.len() > 2 {
        for ty in &types[..last] {
            if let syn::Type::Reference(_) = ty {
                bail!(
                    ty,
                    "only the last argument may be a reference when currying more than two arguments"
                )
            }
        }
    }

    let output = match &sig.output {
        syn::ReturnType::Default => quote! { () },
        syn::ReturnType::Type(_, ty) => quote! { #ty },
    };

    // The type returned after supplying argument `i`. The last one is the
    // declared return type, the ones in between are boxed closures.
    let mut returns = vec![output.clone(); args.len()];
    for i in (1..last).rev() {
        let ty = types[i + 1];
        let next = &returns[i + 1];
        let boxed = quote! { ::std::boxed::Box<dyn ::core::ops::Fn(#ty) -> #next> };
        returns[i] = boxed;
    }

    let second = types[1];
    let first_return = &returns[1];
    let ret = quote! { impl ::core::ops::Fn(#second) -> #first_return };

    let attrs = &func.attrs;
    let vis = &func.vis;
    let name = &sig.ident;
    let block = &func.block;
    let first = args[0];
    let first_ty = types[0];
    let params = args.iter().zip(&types).map(|(arg, ty)| quote! { #arg: #ty });
    let body = stage(1, &args, &types, &returns);

    Ok(quote! {
        #(#attrs)*
        #vis fn #name(#first: #first_ty) -> #ret {
            fn __memocurry_uncurried(#(#params),*) -> #output #block
            #body
        }
    })
}

/// Produce the closure that takes argument `i`.
fn stage(
    i: usize,
    args: &[&syn::Ident],
    types: &[&syn::Type],
    returns: &[TokenStream],
) -> TokenStream {
    let arg = args[i];
    let ty = types[i];
    let captured = &args[..i];

    if i == args.len() - 1 {
        return quote! {
            move |#arg: #ty| __memocurry_uncurried(#(::core::clone::Clone::clone(&#captured),)* #arg)
        };
    }

    let ret = &returns[i];
    let next = stage(i + 1, args, types, returns);
    quote! {
        move |#arg: #ty| -> #ret {
            #(let #captured = ::core::clone::Clone::clone(&#captured);)*
            ::std::boxed::Box::new(#next)
        }
    }
}
