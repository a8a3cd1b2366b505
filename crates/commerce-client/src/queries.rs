//! GraphQL documents sent to the Admin API.

pub const GET_ORDER: &str = r#"
query getOrder($id: ID!) {
  order(id: $id) {
    id
    name
    createdAt
    displayFinancialStatus
    displayFulfillmentStatus
    totalPriceSet { shopMoney { amount currencyCode } }
    shippingLine { discountedPriceSet { shopMoney { amount currencyCode } } }
    customer { id firstName lastName email }
    lineItems(first: 100) {
      edges {
        node {
          id
          name
          quantity
          sku
          variant { title price image { url } }
          discountedTotalSet { shopMoney { amount currencyCode } }
        }
      }
    }
  }
}
"#;

pub const LIST_ORDERS: &str = r#"
query listOrders($first: Int!) {
  orders(first: $first, reverse: true) {
    edges {
      node {
        id
        name
        createdAt
        displayFinancialStatus
        displayFulfillmentStatus
        totalPriceSet { shopMoney { amount currencyCode } }
        customer { id firstName lastName email }
        lineItems(first: 5) {
          edges { node { title quantity variant { price } } }
        }
      }
    }
  }
}
"#;

/// The Admin API caps a page at 250; counts beyond that are not paginated.
pub const COUNT_ORDERS: &str = r#"
query countOrders {
  orders(first: 250) { edges { node { id } } }
}
"#;

pub const TAGS_ADD: &str = r#"
mutation tagsAdd($id: ID!, $tags: [String!]!) {
  tagsAdd(id: $id, tags: $tags) {
    userErrors { field message }
  }
}
"#;

pub const ORDER_UPDATE: &str = r#"
mutation orderUpdate($input: OrderInput!) {
  orderUpdate(input: $input) {
    order { id }
    userErrors { field message }
  }
}
"#;

pub const REFUND_CREATE: &str = r#"
mutation refundCreate($input: RefundInput!) {
  refundCreate(input: $input) {
    refund { id createdAt }
    userErrors { field message }
  }
}
"#;

pub const LIST_PRODUCTS: &str = r#"
query listProducts($first: Int!) {
  products(first: $first) {
    edges {
      node {
        id
        title
        description
        productType
        featuredImage { url }
        priceRangeV2 { minVariantPrice { amount currencyCode } }
      }
    }
  }
}
"#;
