use proc_macro::TokenStream;
use quote::{quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{FnArg, ItemFn, ReturnType, parse_macro_input};

/// Memoize a `&self` accessor into `self._cache`.
///
/// The receiver must own a `_cache: RwLock<InnerCache>` where `InnerCache`
/// has a field named after the function of type `Option<T>`, `T` being the
/// return type. The first call evaluates the body and stores the result,
/// later calls return a clone of the stored value. Returned types should be
/// cheap to clone (an `Arc` or a scalar).
///
/// A poisoned lock is recovered rather than propagated: the cache only ever
/// holds values that were fully computed before the write guard was taken.
#[proc_macro_attribute]
pub fn cache_access(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    // only `&self` accessors with a return value can be cached
    let has_ref_receiver = matches!(
        input.sig.inputs.first(),
        Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none()
    );
    if !has_ref_receiver || input.sig.inputs.len() != 1 {
        return TokenStream::from(quote_spanned! {input.sig.span()=>
            compile_error!("#[cache_access] requires a method taking only `&self`");
        });
    }
    if let ReturnType::Default = input.sig.output {
        return TokenStream::from(quote_spanned! {input.sig.span()=>
            compile_error!("#[cache_access] requires a return type");
        });
    }

    let name = input.sig.ident.clone();
    let body = input.block;
    let sig = input.sig;
    let vis = input.vis;
    let attrs = input.attrs;

    let expanded = quote! {
        #(#attrs)*
        #vis #sig {
            if let Some(cached) = self
                ._cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .#name
                .as_ref()
            {
                return cached.clone();
            }

            let computed = (|| #body)();
            let mut cache = self
                ._cache
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.#name = Some(computed.clone());
            computed
        }
    };

    TokenStream::from(expanded)
}
