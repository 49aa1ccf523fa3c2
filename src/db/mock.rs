//! Static rows served while no database is connected.

use serde::Serialize;
use serde_json::Value;

use crate::db::Table;

#[derive(Serialize)]
struct User {
    id: i64,
    name: &'static str,
    email: &'static str,
    role: &'static str,
    avatar: &'static str,
}

#[derive(Serialize)]
struct Product {
    id: i64,
    name: &'static str,
    description: &'static str,
    price: u32,
    category: &'static str,
    image: &'static str,
    rating: f32,
    stock: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Task {
    id: i64,
    title: &'static str,
    description: &'static str,
    status: &'static str,
    priority: &'static str,
    due_date: &'static str,
    assigned_to: i64,
}

#[derive(Serialize)]
struct Post {
    id: i64,
    title: &'static str,
    content: &'static str,
    author: i64,
    date: &'static str,
    tags: &'static [&'static str],
    likes: u32,
    comments: u32,
}

const USERS: &[User] = &[
    User { id: 1, name: "John Doe", email: "john.doe@example.com", role: "Admin", avatar: "https://randomuser.me/api/portraits/men/1.jpg" },
    User { id: 2, name: "Jane Smith", email: "jane.smith@example.com", role: "User", avatar: "https://randomuser.me/api/portraits/women/2.jpg" },
    User { id: 3, name: "Michael Johnson", email: "michael.johnson@example.com", role: "User", avatar: "https://randomuser.me/api/portraits/men/3.jpg" },
    User { id: 4, name: "Emily Davis", email: "emily.davis@example.com", role: "Manager", avatar: "https://randomuser.me/api/portraits/women/4.jpg" },
    User { id: 5, name: "David Wilson", email: "david.wilson@example.com", role: "User", avatar: "https://randomuser.me/api/portraits/men/5.jpg" },
];

const PRODUCTS: &[Product] = &[
    Product { id: 1, name: "Smartphone X", description: "Latest smartphone with advanced features", price: 999, category: "Electronics", image: "https://images.unsplash.com/photo-1511707171634-5f897ff02aa9", rating: 4.8, stock: 50 },
    Product { id: 2, name: "Laptop Pro", description: "High-performance laptop for professionals", price: 1499, category: "Electronics", image: "https://images.unsplash.com/photo-1496181133206-80ce9b88a853", rating: 4.9, stock: 30 },
    Product { id: 3, name: "Wireless Headphones", description: "Noise-cancelling wireless headphones", price: 299, category: "Audio", image: "https://images.unsplash.com/photo-1505740420928-5e560c06d30e", rating: 4.7, stock: 100 },
    Product { id: 4, name: "Smart Watch", description: "Fitness and health tracking smartwatch", price: 249, category: "Wearables", image: "https://images.unsplash.com/photo-1523275335684-37898b6baf30", rating: 4.5, stock: 75 },
    Product { id: 5, name: "Wireless Earbuds", description: "True wireless earbuds with great sound", price: 149, category: "Audio", image: "https://images.unsplash.com/photo-1572569511254-d8f925fe2cbb", rating: 4.6, stock: 120 },
];

const TASKS: &[Task] = &[
    Task { id: 1, title: "Complete project proposal", description: "Finalize the project proposal document", status: "completed", priority: "high", due_date: "2023-05-15", assigned_to: 1 },
    Task { id: 2, title: "Design UI mockups", description: "Create mockups for the new dashboard", status: "in-progress", priority: "medium", due_date: "2023-05-20", assigned_to: 2 },
    Task { id: 3, title: "Implement authentication", description: "Set up user authentication system", status: "pending", priority: "high", due_date: "2023-05-25", assigned_to: 3 },
    Task { id: 4, title: "Database optimization", description: "Optimize database queries for better performance", status: "pending", priority: "medium", due_date: "2023-05-30", assigned_to: 4 },
    Task { id: 5, title: "Testing and bug fixes", description: "Run tests and fix identified bugs", status: "pending", priority: "high", due_date: "2023-06-05", assigned_to: 5 },
];

const POSTS: &[Post] = &[
    Post { id: 1, title: "Getting Started with React", content: "React is a JavaScript library for building user interfaces...", author: 1, date: "2023-01-15", tags: &["React", "JavaScript", "Frontend"], likes: 45, comments: 12 },
    Post { id: 2, title: "Express.js Best Practices", content: "Express is a minimal and flexible Node.js web application framework...", author: 3, date: "2023-02-22", tags: &["Express", "Node.js", "Backend"], likes: 32, comments: 8 },
    Post { id: 3, title: "TypeScript for React Developers", content: "TypeScript adds static typing to JavaScript, which can help prevent errors...", author: 2, date: "2023-03-10", tags: &["TypeScript", "React", "JavaScript"], likes: 67, comments: 21 },
    Post { id: 4, title: "Server-Side Rendering with React", content: "Server-side rendering (SSR) allows you to render React components on the server...", author: 4, date: "2023-04-05", tags: &["SSR", "React", "Performance"], likes: 28, comments: 6 },
];

fn to_values<T: Serialize>(rows: &[T]) -> Vec<Value> {
    rows.iter()
        .filter_map(|row| serde_json::to_value(row).ok())
        .collect()
}

/// All mock rows of a table.
pub fn rows(table: Table) -> Vec<Value> {
    match table {
        Table::Users => to_values(USERS),
        Table::Products => to_values(PRODUCTS),
        Table::Tasks => to_values(TASKS),
        Table::Posts => to_values(POSTS),
    }
}

/// One mock row by id.
pub fn row(table: Table, id: i64) -> Option<Value> {
    rows(table)
        .into_iter()
        .find(|row| row.get("id").and_then(Value::as_i64) == Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_has_rows() {
        for table in Table::ALL {
            assert!(!rows(table).is_empty(), "{} is empty", table.name());
        }
    }

    #[test]
    fn lookup_by_id() {
        let task = row(Table::Tasks, 2).unwrap();
        assert_eq!(task["dueDate"], "2023-05-20");
        assert_eq!(task["assignedTo"], 2);
        assert!(row(Table::Posts, 99).is_none());
    }
}
